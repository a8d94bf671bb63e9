pub mod dalle;
pub mod gradio;
pub mod image_controller;
