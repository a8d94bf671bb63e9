use actix_web::{web, App, HttpServer};
use actix_cors::Cors;
use std::{fs::File, io::BufReader};

mod apis;
mod cores;
mod configs;
mod middleware;
mod utils;

use crate::configs::settings::{Config, TlsSettings};
use crate::cores::pipeline::Pipeline;
use crate::middleware::rate_limit::RateLimitMiddleware;

#[cfg(test)]
mod test;

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

fn load_tls(tls: &TlsSettings) -> std::io::Result<Option<rustls::ServerConfig>> {
    let (Some(cert_path), Some(key_path)) = (&tls.cert_file, &tls.key_file) else {
        return Ok(None);
    };
    let mut certs_file = BufReader::new(File::open(cert_path)?);
    let mut key_file = BufReader::new(File::open(key_path)?);

    let tls_certs = rustls_pemfile::certs(&mut certs_file).collect::<Result<Vec<_>, _>>()?;
    let tls_key = rustls_pemfile::private_key(&mut key_file)?
        .ok_or_else(|| io_error("TLS setup failed", format!("no private key in {}", key_path)))?;

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(tls_certs, tls_key)
        .map_err(|e| io_error("TLS setup failed", e))?;
    Ok(Some(tls_config))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::load_config().map_err(|e| io_error("Config loading failed", e))?;
    utils::log::init_logging(&config.log_config);

    if config.openai.api_key.is_none() {
        log::warn!("OPENAI_API_KEY is not set, the describe/rewrite/generate path will fail");
    }
    if config.diffusion.token.is_none() {
        log::warn!("HF_TOKEN is not set, the diffusion path will fail");
    }
    if let Some(dir) = &config.upload_dir {
        std::fs::create_dir_all(dir).map_err(|e| io_error(&format!("Failed to create upload dir {}", dir), e))?;
    }

    let tls_config = load_tls(&config.tls)?;
    let bind_address = (config.host.clone(), config.port);
    let rate_limiter = RateLimitMiddleware::from_config(&config);
    let pipeline = web::Data::new(Pipeline::from_config(&config));
    let config = web::Data::new(config);

    // Start the HTTP server
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec!["Content-Type"])
            .max_age(3600);

        // Outermost, so 429 responses also get CORS headers
        App::new()
            .wrap(rate_limiter.clone())
            .wrap(cors)
            .configure(|cfg| apis::configure_app(cfg, config.clone(), pipeline.clone()))
    });

    let server = match tls_config {
        Some(tls_config) => {
            log::info!("Server started on https://{}:{}", bind_address.0, bind_address.1);
            server.bind_rustls_0_23(bind_address, tls_config)?
        }
        None => {
            log::info!("Server started on http://{}:{}", bind_address.0, bind_address.1);
            server.bind(bind_address)?
        }
    };
    server.run().await
}
