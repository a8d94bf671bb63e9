use std::path::Path;

use actix_files::Files;
use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::configs::settings::Config;
use crate::cores::pipeline::Pipeline;

pub mod api_doc;
pub mod schemas;
pub mod transform_api;

use api_doc::ApiDoc;
use transform_api::upload::{multipart_form_config, temp_file_config};

// Everything an App needs: shared state, upload limits, routes, docs and static assets.
pub fn configure_app(cfg: &mut web::ServiceConfig, config: web::Data<Config>, pipeline: web::Data<Pipeline>) {
    cfg.app_data(multipart_form_config(&config))
       .app_data(temp_file_config(&config))
       .app_data(config.clone())
       .app_data(pipeline)
       .configure(transform_api::transform::configure)
       .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // Registered last so the API routes win over files of the same name
    if Path::new(&config.public_dir).is_dir() {
        cfg.service(Files::new("/", &config.public_dir).index_file("index.html"));
    }
}
