use async_trait::async_trait;

use crate::cores::errors::PipelineError;
use crate::cores::pipeline::ImagePayload;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    // Describer service: image in, free-text description out
    async fn describe(&self, image: &ImagePayload) -> Result<String, PipelineError>;
    // Completion service: description + style in, one image-generation prompt out
    async fn rewrite_prompt(&self, description: &str, style: &str) -> Result<String, PipelineError>;
}
