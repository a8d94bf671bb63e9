use utoipa::OpenApi;

use crate::apis::transform_api;
use crate::apis::schemas::{ErrorResponse, TransformResponse, UploadRequestDoc};


#[derive(OpenApi)]
#[openapi(
    paths(
        transform_api::transform::health,
        transform_api::transform::transform,
        transform_api::transform::generate,
    ),
    components(
        schemas(ErrorResponse, TransformResponse, UploadRequestDoc)
    )
)]

pub struct ApiDoc;
