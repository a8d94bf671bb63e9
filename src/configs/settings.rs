use serde::Deserialize;
use std::env;
use std::fs::{metadata, File};
use std::io::Read;

// ---------------------------------------------- Upstream Config ----------------------------------------------
// OpenAI-compatible chat completions + image generations
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub chat_model: String,
    pub image_model: String,
    pub image_size: String,
    pub describe_max_tokens: u32,
    pub rewrite_max_tokens: u32,
    // Loaded from OPENAI_API_KEY, never from the config file
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        OpenAiSettings {
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o".to_string(),
            image_model: "dall-e-3".to_string(),
            image_size: "1024x1024".to_string(),
            describe_max_tokens: 1000,
            rewrite_max_tokens: 500,
            api_key: None,
        }
    }
}

// Hosted diffusion pipeline behind a Gradio Space
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiffusionSettings {
    pub hf_api_base: String,
    pub space: String,
    pub endpoint: String,
    pub prompt: String,
    pub trigger_style: String,
    pub control_type: String,
    pub height: u32,
    pub width: u32,
    pub seed: u64,
    // Loaded from HF_TOKEN, never from the config file
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for DiffusionSettings {
    fn default() -> Self {
        DiffusionSettings {
            hf_api_base: "https://huggingface.co".to_string(),
            space: "jamesliu1217/EasyControl_Ghibli".to_string(),
            endpoint: "/single_condition_generate_image".to_string(),
            prompt: "Ghibli Studio style, Charming hand-drawn anime-style illustration".to_string(),
            trigger_style: "ghibli".to_string(),
            control_type: "Ghibli".to_string(),
            height: 256,
            width: 256,
            seed: 3,
            token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TlsSettings {
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

// ---------------------------------------------- Config ----------------------------------------------
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub public_dir: String,
    pub upload_dir: Option<String>,
    pub max_upload_bytes: usize,
    pub log_config: String,
    pub transform_default_style: String,
    pub generate_default_style: String,
    pub rate_limit_enabled: bool,
    pub rate_limit_tps: usize,
    pub rate_limit_bucket_capacity: usize,
    pub rate_limit_refill_interval: u64,
    pub tls: TlsSettings,
    pub openai: OpenAiSettings,
    pub diffusion: DiffusionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_dir: "public".to_string(),
            upload_dir: None,
            max_upload_bytes: 20 * 1024 * 1024,
            log_config: "src/configs/log4rs.yaml".to_string(),
            transform_default_style: "Naruto anime style".to_string(),
            generate_default_style: "Ghibli".to_string(),
            rate_limit_enabled: false,
            rate_limit_tps: 10,
            rate_limit_bucket_capacity: 20,
            rate_limit_refill_interval: 1000,
            tls: TlsSettings::default(),
            openai: OpenAiSettings::default(),
            diffusion: DiffusionSettings::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: serde_yaml::Error },
    #[error("invalid PORT value: {0}")]
    InvalidPort(String),
}

impl Config {
    // Resolve the config file: $STYLEGEN_CONFIG, then /etc/stylegen, then the source tree.
    // A missing file is not an error, every field has a default.
    pub fn config_path() -> Option<String> {
        if let Ok(path) = env::var("STYLEGEN_CONFIG") {
            return Some(path);
        }
        ["/etc/stylegen/configs.yaml", "src/configs/configs.yaml"]
            .iter()
            .find(|p| metadata(p).is_ok())
            .map(|p| p.to_string())
    }

    pub fn from_yaml(contents: &str) -> Result<Config, serde_yaml::Error> {
        // An empty document deserializes to null, treat it as "all defaults"
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(contents)
    }

    pub fn load_config() -> Result<Config, ConfigError> {
        let mut config = match Config::config_path() {
            Some(path) => {
                let mut contents = String::new();
                File::open(&path)
                    .and_then(|mut file| file.read_to_string(&mut contents))
                    .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
                Config::from_yaml(&contents).map_err(|source| ConfigError::Parse { path, source })?
            }
            None => Config::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    // Secrets and deployment overrides come from the process environment only.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.openai.api_key = non_empty("OPENAI_API_KEY");
        self.diffusion.token = non_empty("HF_TOKEN");
        if let Some(port) = non_empty("PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }
        Ok(())
    }
}
