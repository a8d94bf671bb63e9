use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::cores::pipeline::PipelineOutput;

// ------------------------------------------ General Error API ------------------------------------------
#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub error: String,
}

// ------------------------------------------ Transform API ------------------------------------------
#[derive(Serialize, Debug, ToSchema)]
pub struct TransformResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    // Diffusion gateway output, forwarded verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<Value>,
}

// Multipart body accepted by /transform and /generate (documentation only)
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadRequestDoc {
    #[schema(value_type = String, format = Binary)]
    pub photo: Option<Vec<u8>>,
    #[schema(value_type = String, format = Binary)]
    pub image: Option<Vec<u8>>,
    pub style: Option<String>,
    pub control_type: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub seed: Option<u64>,
}

/// Response shape of an endpoint.
///
/// `/transform` answers with bare bodies (`{ imageUrl }`, `{ error }`),
/// `/generate` adds a `success` flag to every body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    Plain,
    Flagged,
}

impl Envelope {
    pub fn for_path(path: &str) -> Envelope {
        if path.trim_end_matches('/').ends_with("/generate") {
            Envelope::Flagged
        } else {
            Envelope::Plain
        }
    }

    fn flag(self, success: bool) -> Option<bool> {
        match self {
            Envelope::Plain => None,
            Envelope::Flagged => Some(success),
        }
    }

    pub fn success(self, output: PipelineOutput) -> HttpResponse {
        let body = match output {
            PipelineOutput::ImageUrl(url) => TransformResponse {
                success: self.flag(true),
                image_url: Some(url),
                data: None,
            },
            PipelineOutput::Diffusion(data) => TransformResponse {
                success: self.flag(true),
                image_url: None,
                data: Some(data),
            },
        };
        HttpResponse::Ok().json(body)
    }

    pub fn failure(self, status: StatusCode, message: &str) -> HttpResponse {
        HttpResponse::build(status).json(ErrorResponse {
            success: self.flag(false),
            error: message.to_string(),
        })
    }
}
