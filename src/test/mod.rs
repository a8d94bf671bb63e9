
use actix_web::web;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::configs::settings::Config;
use crate::cores::pipeline::Pipeline;

pub const BOUNDARY: &str = "stylegen-test-boundary";
pub const CHAT: &str = "/v1/chat/completions";
pub const IMAGES: &str = "/v1/images/generations";
pub const GRADIO_CALL: &str = "/gradio_api/call/single_condition_generate_image";

pub enum Field<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a str, &'a [u8]),
}

// Hand-built multipart/form-data body
pub fn multipart(fields: &[Field]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match field {
            Field::Text(name, value) => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
            Field::File(name, file_name, content_type, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn content_type() -> (&'static str, String) {
    ("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
}

pub const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00fake-jpeg-body\xff\xd9";

/// Mock vendors plus a private upload directory for one test.
pub struct Upstreams {
    pub openai: MockServer,
    pub hf: MockServer,
    pub uploads: TempDir,
}

impl Upstreams {
    pub async fn start() -> Self {
        Upstreams {
            openai: MockServer::start().await,
            hf: MockServer::start().await,
            uploads: tempfile::tempdir().unwrap(),
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.public_dir = "does-not-exist".to_string();
        config.upload_dir = Some(self.uploads.path().display().to_string());
        config.openai.base_url = format!("{}/v1", self.openai.uri());
        config.openai.api_key = Some("sk-test".to_string());
        config.diffusion.hf_api_base = self.hf.uri();
        config.diffusion.token = Some("hf_test".to_string());
        config
    }

    pub fn app_state(&self) -> (web::Data<Config>, web::Data<Pipeline>) {
        let config = self.config();
        let pipeline = web::Data::new(Pipeline::from_config(&config));
        (web::Data::new(config), pipeline)
    }

    pub fn leftover_uploads(&self) -> usize {
        std::fs::read_dir(self.uploads.path()).unwrap().count()
    }

    // Describe requests carry the image part, rewrite requests are plain text
    pub async fn mount_chat(&self) {
        Mock::given(method("POST"))
            .and(path(CHAT))
            .respond_with(|req: &Request| {
                let body = String::from_utf8_lossy(&req.body);
                let content = if body.contains("image_url") {
                    "A person in a blue hoodie waving, city street at dusk."
                } else {
                    "  Anime-style illustration of a person in a blue hoodie waving.  "
                };
                ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": content } }]
                }))
            })
            .mount(&self.openai)
            .await;
    }

    pub async fn mount_images(&self) {
        Mock::given(method("POST"))
            .and(path(IMAGES))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "created": 1700000000,
                "data": [{ "url": "https://images.test/generated.png" }]
            })))
            .mount(&self.openai)
            .await;
    }

    pub async fn mount_space(&self) {
        Mock::given(method("GET"))
            .and(path("/api/spaces/jamesliu1217/EasyControl_Ghibli/host"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "subdomain": "jamesliu1217-easycontrol-ghibli",
                "host": self.hf.uri(),
            })))
            .mount(&self.hf)
            .await;
        Mock::given(method("GET"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "api_prefix": "/gradio_api" })))
            .mount(&self.hf)
            .await;
        Mock::given(method("POST"))
            .and(path("/gradio_api/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["/tmp/gradio/1/photo.jpg"])))
            .mount(&self.hf)
            .await;
        Mock::given(method("POST"))
            .and(path(GRADIO_CALL))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "evt-42" })))
            .mount(&self.hf)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/evt-42", GRADIO_CALL)))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "event: generating\ndata: null\n\nevent: complete\ndata: [{\"url\": \"https://space.test/out.webp\"}]\n\n",
                "text/event-stream",
            ))
            .mount(&self.hf)
            .await;
    }

    pub async fn requests_to(&self, server: &MockServer, route: &str) -> Vec<Request> {
        server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path() == route)
            .collect()
    }
}
