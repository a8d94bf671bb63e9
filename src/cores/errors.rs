use reqwest::StatusCode;
use thiserror::Error;

// Upstream service names used in errors and logs
pub const DESCRIBER: &str = "describer";
pub const COMPLETION: &str = "completion";
pub const GENERATION: &str = "generation";
pub const DIFFUSION: &str = "diffusion gateway";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned {status}: {body}")]
    UpstreamStatus {
        service: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("malformed response from {service}: {detail}")]
    MalformedResponse { service: &'static str, detail: String },
    #[error("no credential configured for {0}")]
    MissingCredential(&'static str),
    #[error("diffusion gateway error: {0}")]
    Gateway(String),
    #[error("failed to read uploaded file: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> PipelineError {
        move |source| PipelineError::Transport { service, source }
    }

    pub fn malformed(service: &'static str, detail: impl Into<String>) -> PipelineError {
        PipelineError::MalformedResponse {
            service,
            detail: detail.into(),
        }
    }
}

// Reject non-2xx responses, keeping the upstream body for the logs.
pub async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, PipelineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::UpstreamStatus { service, status, body })
}
