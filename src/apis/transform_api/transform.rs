use actix_multipart::form::MultipartForm;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use log::{error, info, warn};
use thiserror::Error;

use crate::apis::schemas::Envelope;
use crate::apis::transform_api::upload::{IntakeError, UploadForm, UploadRequest};
use crate::configs::settings::Config;
use crate::cores::errors::PipelineError;
use crate::cores::image_models::image_controller::DiffusionParams;
use crate::cores::pipeline::{Pipeline, PipelineOutput, Route};
use crate::utils::log::log_request;

pub const GENERATION_FAILED: &str = "Error while generating the image.";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
       .service(health)
       .service(transform)
       .service(generate);
}

#[derive(Error, Debug)]
enum TransformError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[get("/")]
pub async fn index() -> impl Responder {
    "Hello from stylegen"
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, body = String))
)]
#[get("/health")]
pub async fn health() -> impl Responder {
    "OK"
}

#[utoipa::path(
    post,
    path = "/transform",
    request_body(content = crate::apis::schemas::UploadRequestDoc, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = crate::apis::schemas::TransformResponse),
        (status = 400, body = crate::apis::schemas::ErrorResponse),
        (status = 500, body = crate::apis::schemas::ErrorResponse),
    )
)]
#[post("/transform")]
pub async fn transform(
    req: HttpRequest,
    MultipartForm(form): MultipartForm<UploadForm>,
    pipeline: web::Data<Pipeline>,
    config: web::Data<Config>,
) -> HttpResponse {
    respond(&req, form, &pipeline, &config, &config.transform_default_style, Envelope::Plain).await
}

#[utoipa::path(
    post,
    path = "/generate",
    request_body(content = crate::apis::schemas::UploadRequestDoc, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = crate::apis::schemas::TransformResponse),
        (status = 400, body = crate::apis::schemas::ErrorResponse),
        (status = 500, body = crate::apis::schemas::ErrorResponse),
    )
)]
#[post("/generate")]
pub async fn generate(
    req: HttpRequest,
    MultipartForm(form): MultipartForm<UploadForm>,
    pipeline: web::Data<Pipeline>,
    config: web::Data<Config>,
) -> HttpResponse {
    respond(&req, form, &pipeline, &config, &config.generate_default_style, Envelope::Flagged).await
}

async fn respond(
    req: &HttpRequest,
    form: UploadForm,
    pipeline: &Pipeline,
    config: &Config,
    default_style: &str,
    envelope: Envelope,
) -> HttpResponse {
    match execute(form, pipeline, config, default_style).await {
        Ok(output) => {
            let response = envelope.success(output);
            info!(target: "access", "{}", log_request(req, response.status().as_u16(), None));
            response
        }
        Err(TransformError::Intake(err)) => {
            let message = err.to_string();
            warn!("Rejected upload on {}: {}", req.path(), message);
            let response = envelope.failure(StatusCode::BAD_REQUEST, &message);
            info!(target: "access", "{}", log_request(req, response.status().as_u16(), Some(&message)));
            response
        }
        Err(TransformError::Pipeline(err)) => {
            // Upstream detail stays in the logs, the caller gets a fixed message
            error!("Image generation failed on {}: {}", req.path(), err);
            let response = envelope.failure(StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED);
            info!(target: "access", "{}", log_request(req, response.status().as_u16(), Some(&err.to_string())));
            response
        }
    }
}

async fn execute(
    form: UploadForm,
    pipeline: &Pipeline,
    config: &Config,
    default_style: &str,
) -> Result<PipelineOutput, TransformError> {
    let UploadRequest { file, style, fields } = UploadRequest::from_form(form, default_style)?;
    info!("Processing upload with style {:?}", style);

    // The chat/image path never reads the diffusion fields
    let params = match pipeline.route(&style) {
        Route::Diffusion => fields.resolve(&config.diffusion)?,
        Route::ChatImage => DiffusionParams::from(&config.diffusion),
    };

    let result: Result<PipelineOutput, PipelineError> = async {
        let image = file.read_payload().await?;
        pipeline.run(&image, &style, params).await
    }
    .await;

    file.close();
    Ok(result?)
}
