use actix_web::HttpRequest;
use chrono::Local;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

// Load log4rs from its YAML file, falling back to plain console logging.
pub fn init_logging(config_path: &str) {
    let err = match log4rs::init_file(config_path, Default::default()) {
        Ok(()) => return,
        Err(err) => err,
    };

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l})} {t} - {m}{n}")))
        .build();
    let fallback = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match fallback {
        Ok(config) => {
            if log4rs::init_config(config).is_ok() {
                log::warn!("Failed to load log config {}: {}. Logging to console.", config_path, err);
            }
        }
        Err(build_err) => eprintln!("Failed to configure logging: {} / {}", err, build_err),
    }
}

// Access log and error log line for one request, nginx style
pub fn log_request(req: &HttpRequest, status_code: u16, error_message: Option<&str>) -> String {
    let referer = req.headers()
        .get("Referer")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    let user_agent = req.headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let client_ip = req.peer_addr().map(|addr| addr.ip().to_string()).unwrap_or_else(|| "unknown".to_string());
    let time = Local::now().format("%d/%b/%Y:%H:%M:%S %z");

    let line = format!(
        "{client_ip} - - [{time}] \"{method} {uri} {version:?}\" {status_code} \"{referer}\" \"{user_agent}\"",
        method = req.method(),
        uri = req.uri(),
        version = req.version(),
    );
    match error_message {
        Some(msg) => format!("{} \"{}\"", line, msg),
        None => line,
    }
}
