pub mod chat_controller;
pub mod openai;
