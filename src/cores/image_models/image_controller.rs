use async_trait::async_trait;
use serde_json::Value;

use crate::configs::settings::DiffusionSettings;
use crate::cores::errors::PipelineError;
use crate::cores::pipeline::ImagePayload;

#[async_trait]
pub trait ImageProvider: Send + Sync {
    // Returns a URL (or data URL) referencing the generated image
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionParams {
    pub height: u32,
    pub width: u32,
    pub seed: u64,
    pub control_type: String,
}

impl From<&DiffusionSettings> for DiffusionParams {
    fn from(settings: &DiffusionSettings) -> Self {
        DiffusionParams {
            height: settings.height,
            width: settings.width,
            seed: settings.seed,
            control_type: settings.control_type.clone(),
        }
    }
}

#[async_trait]
pub trait DiffusionProvider: Send + Sync {
    // Returns the gateway's output data verbatim
    async fn transform(&self, image: &ImagePayload, params: &DiffusionParams) -> Result<Value, PipelineError>;
}
