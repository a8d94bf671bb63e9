use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;
use reqwest::Client;

use crate::configs::settings::OpenAiSettings;
use crate::cores::chat_models::chat_controller::ChatProvider;
use crate::cores::errors::{ensure_success, PipelineError, COMPLETION, DESCRIBER};
use crate::cores::pipeline::ImagePayload;
use crate::cores::schemas::{ChatMessage, ChatRequest, ChatResponse, ContentPart, ImageUrl, MessageContent};

pub const DESCRIBE_INSTRUCTION: &str = "Describe this image in great detail: posture, clothing, mood, background. \
     Give only the description, without analysis or warnings.";

pub fn rewrite_instruction(description: &str, style: &str) -> String {
    format!(
        "Here is an image description: \"{}\". Write a prompt for an image generation model that turns \
         this scene into a {} style, keeping the character's pose, clothing, and expression. \
         Reply with the prompt only.",
        description, style
    )
}

pub fn data_url(image: &ImagePayload) -> String {
    format!("data:{};base64,{}", image.mime_or_default(), STANDARD.encode(&image.bytes))
}

pub struct OpenAiChat {
    client: Client,
    settings: OpenAiSettings,
}

impl OpenAiChat {
    pub fn new(client: Client, settings: OpenAiSettings) -> Self {
        OpenAiChat { client, settings }
    }

    async fn complete(
        &self,
        service: &'static str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    ) -> Result<String, PipelineError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(PipelineError::MissingCredential(service))?;

        let request_body = ChatRequest {
            model: &self.settings.chat_model,
            messages,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        debug!("POST {} ({})", url, service);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(PipelineError::transport(service))?;
        let response = ensure_success(service, response).await?;

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::malformed(service, err.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| PipelineError::malformed(service, "no message content in first choice"))?;
        Ok(content)
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn describe(&self, image: &ImagePayload) -> Result<String, PipelineError> {
        let message = ChatMessage {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: DESCRIBE_INSTRUCTION.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url(image) },
                },
            ]),
        };
        self.complete(DESCRIBER, vec![message], self.settings.describe_max_tokens)
            .await
    }

    async fn rewrite_prompt(&self, description: &str, style: &str) -> Result<String, PipelineError> {
        let message = ChatMessage {
            role: "user",
            content: MessageContent::Text(rewrite_instruction(description, style)),
        };
        self.complete(COMPLETION, vec![message], self.settings.rewrite_max_tokens)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: String) -> OpenAiSettings {
        OpenAiSettings {
            base_url,
            api_key: Some("sk-test".to_string()),
            ..OpenAiSettings::default()
        }
    }

    fn image() -> ImagePayload {
        ImagePayload {
            bytes: Bytes::from_static(b"png-bytes"),
            mime_type: Some("image/png".to_string()),
            file_name: None,
        }
    }

    fn chat_reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        }))
    }

    #[test]
    fn data_url_uses_upload_mime() {
        assert_eq!(data_url(&image()), "data:image/png;base64,cG5nLWJ5dGVz");
    }

    #[test]
    fn rewrite_instruction_embeds_description_and_style() {
        let text = rewrite_instruction("a girl in a red coat", "Naruto anime style");
        assert!(text.contains("\"a girl in a red coat\""));
        assert!(text.contains("Naruto anime style"));
        assert!(text.contains("pose, clothing, and expression"));
    }

    #[test]
    fn multimodal_message_serializes_as_parts() {
        let message = ChatMessage {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: "hi".to_string() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: "data:x".to_string() },
                },
            ]),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": "hi" },
                    { "type": "image_url", "image_url": { "url": "data:x" } }
                ]
            })
        );
    }

    #[actix_rt::test]
    async fn describe_trims_content_and_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(chat_reply("  a person on a beach \n"))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(Client::new(), settings(format!("{}/v1", server.uri())));
        let description = chat.describe(&image()).await.unwrap();
        assert_eq!(description, "a person on a beach");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,cG5nLWJ5dGVz"
        );
    }

    #[actix_rt::test]
    async fn rewrite_sends_plain_text_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(chat_reply("anime prompt"))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(Client::new(), settings(server.uri()));
        let prompt = chat.rewrite_prompt("a cat", "Ghibli watercolor").await.unwrap();
        assert_eq!(prompt, "anime prompt");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["max_tokens"], 500);
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("Ghibli watercolor"));
    }

    #[actix_rt::test]
    async fn non_success_status_is_an_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(Client::new(), settings(server.uri()));
        match chat.describe(&image()).await {
            Err(PipelineError::UpstreamStatus { service, status, body }) => {
                assert_eq!(service, DESCRIBER);
                assert_eq!(status.as_u16(), 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn empty_choices_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(Client::new(), settings(server.uri()));
        let result = chat.rewrite_prompt("a cat", "noir").await;
        assert!(matches!(result, Err(PipelineError::MalformedResponse { service: COMPLETION, .. })));
    }

    #[actix_rt::test]
    async fn missing_api_key_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(chat_reply("x")).expect(0).mount(&server).await;

        let mut settings = settings(server.uri());
        settings.api_key = None;
        let chat = OpenAiChat::new(Client::new(), settings);
        let result = chat.describe(&image()).await;
        assert!(matches!(result, Err(PipelineError::MissingCredential(DESCRIBER))));
    }
}
