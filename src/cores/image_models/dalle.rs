use async_trait::async_trait;
use reqwest::Client;

use crate::configs::settings::OpenAiSettings;
use crate::cores::errors::{ensure_success, PipelineError, GENERATION};
use crate::cores::image_models::image_controller::ImageProvider;
use crate::cores::schemas::{ImageGenerationRequest, ImageGenerationResponse};

pub struct DallE {
    client: Client,
    settings: OpenAiSettings,
}

impl DallE {
    pub fn new(client: Client, settings: OpenAiSettings) -> Self {
        DallE { client, settings }
    }
}

#[async_trait]
impl ImageProvider for DallE {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(PipelineError::MissingCredential(GENERATION))?;

        // 1. Always a single image at the configured size
        let request_body = ImageGenerationRequest {
            model: &self.settings.image_model,
            prompt,
            n: 1,
            size: &self.settings.image_size,
        };

        // 2. Send the POST request
        let url = format!("{}/images/generations", self.settings.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(PipelineError::transport(GENERATION))?;
        let response = ensure_success(GENERATION, response).await?;

        // 3. Take the first image, inline payloads become a data URL
        let images: ImageGenerationResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::malformed(GENERATION, err.to_string()))?;
        let image = images
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::malformed(GENERATION, "empty data array"))?;
        match (image.url, image.b64_json) {
            (Some(url), _) => Ok(url),
            (None, Some(b64)) => Ok(format!("data:image/png;base64,{}", b64)),
            (None, None) => Err(PipelineError::malformed(GENERATION, "image has neither url nor b64_json")),
        }
    }
}
