pub mod chat_models;
pub mod errors;
pub mod image_models;
pub mod pipeline;
pub mod schemas;
