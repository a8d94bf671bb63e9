use async_trait::async_trait;
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use crate::configs::settings::DiffusionSettings;
use crate::cores::errors::{ensure_success, PipelineError, DIFFUSION};
use crate::cores::image_models::image_controller::{DiffusionParams, DiffusionProvider};
use crate::cores::pipeline::ImagePayload;
use crate::cores::schemas::{GradioCall, GradioConfig, GradioEvent, GradioFileData, GradioMeta, SpaceHost};

// A resolved Space: host plus the Gradio API prefix ("" on Gradio 4, "/gradio_api" on 5).
#[derive(Debug, Clone, PartialEq)]
pub struct GradioSession {
    pub root: String,
}

pub struct GradioDiffusion {
    client: Client,
    settings: DiffusionSettings,
}

impl GradioDiffusion {
    pub fn new(client: Client, settings: DiffusionSettings) -> Self {
        GradioDiffusion { client, settings }
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.settings.token.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn endpoint_name(&self) -> &str {
        self.settings.endpoint.trim_start_matches('/')
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, PipelineError> {
        debug!("GET {}", url);
        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(PipelineError::transport(DIFFUSION))?;
        let response = ensure_success(DIFFUSION, response).await?;
        response
            .json()
            .await
            .map_err(|err| PipelineError::malformed(DIFFUSION, format!("{}: {}", url, err)))
    }

    pub async fn connect(&self) -> Result<GradioSession, PipelineError> {
        let host_url = format!(
            "{}/api/spaces/{}/host",
            self.settings.hf_api_base.trim_end_matches('/'),
            self.settings.space
        );
        let space: SpaceHost = self.get_json(&host_url).await?;
        let host = space.host.trim_end_matches('/').to_string();

        let config: GradioConfig = self.get_json(&format!("{}/config", host)).await?;
        let prefix = config.api_prefix.unwrap_or_default();
        let prefix = prefix.trim_matches('/');
        let root = if prefix.is_empty() {
            host
        } else {
            format!("{}/{}", host, prefix)
        };
        info!("Connected to Space {} at {}", self.settings.space, root);
        Ok(GradioSession { root })
    }

    pub async fn upload(&self, session: &GradioSession, image: &ImagePayload) -> Result<GradioFileData, PipelineError> {
        let file_name = image.file_name.clone().unwrap_or_else(|| "upload".to_string());
        let mime_type = image.mime_or_default().to_string();
        let part = Part::stream(image.bytes.clone())
            .file_name(file_name.clone())
            .mime_str(&mime_type)
            .map_err(|err| PipelineError::Gateway(format!("invalid upload mime type {}: {}", mime_type, err)))?;

        let response = self
            .authed(self.client.post(format!("{}/upload", session.root)))
            .multipart(Form::new().part("files", part))
            .send()
            .await
            .map_err(PipelineError::transport(DIFFUSION))?;
        let response = ensure_success(DIFFUSION, response).await?;
        let paths: Vec<String> = response
            .json()
            .await
            .map_err(|err| PipelineError::malformed(DIFFUSION, format!("upload: {}", err)))?;
        let path = paths
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::malformed(DIFFUSION, "upload returned no path"))?;

        Ok(GradioFileData {
            path,
            orig_name: Some(file_name),
            mime_type: Some(mime_type),
            meta: GradioMeta::default(),
        })
    }

    // Positional inputs of the Space's single_condition_generate_image function
    pub fn call_body(&self, file: GradioFileData, params: &DiffusionParams) -> Result<GradioCall, PipelineError> {
        let file = serde_json::to_value(file).map_err(|err| PipelineError::Gateway(err.to_string()))?;
        Ok(GradioCall {
            data: vec![
                json!(self.settings.prompt),
                file,
                json!(params.height),
                json!(params.width),
                json!(params.seed),
                json!(params.control_type),
            ],
        })
    }

    pub async fn predict(&self, session: &GradioSession, body: &GradioCall) -> Result<Value, PipelineError> {
        let call_url = format!("{}/call/{}", session.root, self.endpoint_name());
        let response = self
            .authed(self.client.post(&call_url))
            .json(body)
            .send()
            .await
            .map_err(PipelineError::transport(DIFFUSION))?;
        let response = ensure_success(DIFFUSION, response).await?;
        let event: GradioEvent = response
            .json()
            .await
            .map_err(|err| PipelineError::malformed(DIFFUSION, format!("call: {}", err)))?;
        debug!("Gradio event {} queued", event.event_id);

        // The result stream stays open until the job completes or fails
        let response = self
            .authed(self.client.get(format!("{}/{}", call_url, event.event_id)))
            .send()
            .await
            .map_err(PipelineError::transport(DIFFUSION))?;
        let response = ensure_success(DIFFUSION, response).await?;
        let stream = response.text().await.map_err(PipelineError::transport(DIFFUSION))?;
        parse_sse_result(&stream)
    }
}

#[async_trait]
impl DiffusionProvider for GradioDiffusion {
    async fn transform(&self, image: &ImagePayload, params: &DiffusionParams) -> Result<Value, PipelineError> {
        if self.settings.token.is_none() {
            return Err(PipelineError::MissingCredential(DIFFUSION));
        }
        let session = self.connect().await?;
        let file = self.upload(&session, image).await?;
        let body = self.call_body(file, params)?;
        self.predict(&session, &body).await
    }
}

// Extract the data of the `complete` event from a Gradio SSE body.
pub fn parse_sse_result(stream: &str) -> Result<Value, PipelineError> {
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();

    // A trailing empty line flushes the last block even without a final separator
    for line in stream.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if !event.is_empty() || !data.is_empty() {
                let payload = data.join("\n");
                match event.as_str() {
                    "complete" => {
                        return serde_json::from_str(&payload)
                            .map_err(|err| PipelineError::malformed(DIFFUSION, format!("complete event: {}", err)));
                    }
                    "error" => {
                        let detail = if payload.is_empty() || payload == "null" {
                            "job failed without a message".to_string()
                        } else {
                            payload
                        };
                        return Err(PipelineError::Gateway(detail));
                    }
                    _ => {}
                }
            }
            event.clear();
            data.clear();
        } else if let Some(name) = line.strip_prefix("event:") {
            event = name.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    Err(PipelineError::Gateway("result stream ended without a complete event".to_string()))
}
