use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------------------ Chat Completions ------------------------------------------
#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Serialize, Debug)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

// A plain string for text-only prompts, a list of parts for multimodal ones
#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
pub struct ChatChoice {
    pub message: AssistantMessage,
}

#[derive(Deserialize, Debug)]
pub struct AssistantMessage {
    pub content: Option<String>,
}

// ------------------------------------------ Image Generations ------------------------------------------
#[derive(Serialize, Debug)]
pub struct ImageGenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub n: u32,
    pub size: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct ImageGenerationResponse {
    pub data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
pub struct ImageData {
    pub url: Option<String>,
    pub b64_json: Option<String>,
}

// ------------------------------------------ Gradio Gateway ------------------------------------------
#[derive(Deserialize, Debug)]
pub struct SpaceHost {
    pub host: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct GradioConfig {
    #[serde(default)]
    pub api_prefix: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct GradioCall {
    pub data: Vec<Value>,
}

#[derive(Deserialize, Debug)]
pub struct GradioEvent {
    pub event_id: String,
}

#[derive(Serialize, Debug)]
pub struct GradioFileData {
    pub path: String,
    pub orig_name: Option<String>,
    pub mime_type: Option<String>,
    pub meta: GradioMeta,
}

#[derive(Serialize, Debug)]
pub struct GradioMeta {
    #[serde(rename = "_type")]
    pub kind: &'static str,
}

impl Default for GradioMeta {
    fn default() -> Self {
        GradioMeta { kind: "gradio.FileData" }
    }
}
