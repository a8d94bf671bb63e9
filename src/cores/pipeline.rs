use std::sync::Arc;

use bytes::Bytes;
use log::info;
use serde_json::Value;

use crate::configs::settings::Config;
use crate::cores::chat_models::chat_controller::ChatProvider;
use crate::cores::chat_models::openai::OpenAiChat;
use crate::cores::errors::PipelineError;
use crate::cores::image_models::dalle::DallE;
use crate::cores::image_models::gradio::GradioDiffusion;
use crate::cores::image_models::image_controller::{DiffusionParams, DiffusionProvider, ImageProvider};

const DEFAULT_MIME: &str = "image/jpeg";

// Bytes of one uploaded image, read out of the request's temp file.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Bytes,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

impl ImagePayload {
    pub fn mime_or_default(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_MIME)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    ImageUrl(String),
    Diffusion(Value),
}

// Which path a style directive selects; decided once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ChatImage,
    Diffusion,
}

pub struct Pipeline {
    chat: Arc<dyn ChatProvider>,
    images: Arc<dyn ImageProvider>,
    diffusion: Arc<dyn DiffusionProvider>,
    trigger_style: String,
}

impl Pipeline {
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        images: Arc<dyn ImageProvider>,
        diffusion: Arc<dyn DiffusionProvider>,
        trigger_style: impl Into<String>,
    ) -> Self {
        Pipeline {
            chat,
            images,
            diffusion,
            trigger_style: trigger_style.into(),
        }
    }

    // One pooled HTTP client shared by every upstream provider
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::new();
        Pipeline::new(
            Arc::new(OpenAiChat::new(client.clone(), config.openai.clone())),
            Arc::new(DallE::new(client.clone(), config.openai.clone())),
            Arc::new(GradioDiffusion::new(client, config.diffusion.clone())),
            config.diffusion.trigger_style.clone(),
        )
    }

    // Surrounding whitespace is ignored, so " Ghibli" also selects the gateway
    pub fn route(&self, style: &str) -> Route {
        if style.trim().eq_ignore_ascii_case(self.trigger_style.trim()) {
            Route::Diffusion
        } else {
            Route::ChatImage
        }
    }

    pub async fn run(
        &self,
        image: &ImagePayload,
        style: &str,
        params: DiffusionParams,
    ) -> Result<PipelineOutput, PipelineError> {
        match self.route(style) {
            Route::Diffusion => {
                info!("Style {:?} routed to the diffusion gateway", style);
                let data = self.diffusion.transform(image, &params).await?;
                Ok(PipelineOutput::Diffusion(data))
            }
            Route::ChatImage => {
                let url = self.describe_and_generate(image, style).await?;
                Ok(PipelineOutput::ImageUrl(url))
            }
        }
    }

    // describe -> rewrite -> generate, the first failure aborts the rest
    async fn describe_and_generate(&self, image: &ImagePayload, style: &str) -> Result<String, PipelineError> {
        let description = self.chat.describe(image).await?;
        info!("Description obtained:\n{}", description);

        let prompt = self.chat.rewrite_prompt(&description, style).await?;
        info!("Image prompt generated:\n{}", prompt);

        let url = self.images.generate(&prompt).await?;
        info!("Image generated: {}", url);
        Ok(url)
    }
}
