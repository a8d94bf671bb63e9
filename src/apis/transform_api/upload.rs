use std::path::Path;

use actix_multipart::form::tempfile::{TempFile, TempFileConfig};
use actix_multipart::form::text::Text;
use actix_multipart::form::{MultipartForm, MultipartFormConfig};
use actix_web::error::InternalError;
use actix_web::HttpResponse;
use log::{debug, warn};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::apis::schemas::Envelope;
use crate::configs::settings::{Config, DiffusionSettings};
use crate::cores::image_models::image_controller::DiffusionParams;
use crate::cores::pipeline::ImagePayload;

const MIN_DIMENSION: u32 = 64;
const MAX_DIMENSION: u32 = 1024;

// Union of both endpoint variants: the file may arrive as `photo` or `image`.
#[derive(Debug, MultipartForm)]
pub struct UploadForm {
    pub photo: Option<TempFile>,
    pub image: Option<TempFile>,
    pub style: Option<Text<String>>,
    pub control_type: Option<Text<String>>,
    pub height: Option<Text<String>>,
    pub width: Option<Text<String>>,
    pub seed: Option<Text<String>>,
}

#[derive(Error, Debug, PartialEq)]
pub enum IntakeError {
    #[error("No image uploaded: send the file in the `photo` or `image` field.")]
    MissingFile,
    #[error("The uploaded image is empty.")]
    EmptyFile,
    #[error("Invalid `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// The request's temporary copy of the uploaded image.
///
/// Owned by exactly one request. The file is removed by [`UploadedFile::close`]
/// on the normal path and by `Drop` of the inner `NamedTempFile` on every other
/// exit (early return, error, cancelled future).
pub struct UploadedFile {
    file: NamedTempFile,
    mime_type: Option<String>,
    file_name: Option<String>,
}

impl UploadedFile {
    pub fn from_temp(temp: TempFile) -> Result<Self, IntakeError> {
        if temp.size == 0 {
            return Err(IntakeError::EmptyFile);
        }
        Ok(UploadedFile {
            file: temp.file,
            mime_type: temp.content_type.map(|mime| mime.essence_str().to_string()),
            file_name: temp.file_name,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read_payload(&self) -> std::io::Result<ImagePayload> {
        let bytes = tokio::fs::read(self.path()).await?;
        Ok(ImagePayload {
            bytes: bytes.into(),
            mime_type: self.mime_type.clone(),
            file_name: self.file_name.clone(),
        })
    }

    pub fn close(self) {
        let path = self.path().display().to_string();
        match self.file.close() {
            Ok(()) => debug!("Removed upload {}", path),
            Err(err) => warn!("Failed to remove upload {}: {}", path, err),
        }
    }
}

// Diffusion overrides as sent by the caller, validated only when the gateway is used.
#[derive(Debug, Default)]
pub struct DiffusionFields {
    control_type: Option<String>,
    height: Option<String>,
    width: Option<String>,
    seed: Option<String>,
}

impl DiffusionFields {
    pub fn resolve(&self, defaults: &DiffusionSettings) -> Result<DiffusionParams, IntakeError> {
        let base = DiffusionParams::from(defaults);
        Ok(DiffusionParams {
            height: parse_dimension("height", self.height.as_deref(), base.height)?,
            width: parse_dimension("width", self.width.as_deref(), base.width)?,
            seed: parse_seed(self.seed.as_deref(), base.seed)?,
            control_type: self.control_type.clone().unwrap_or(base.control_type),
        })
    }
}

pub struct UploadRequest {
    pub file: UploadedFile,
    pub style: String,
    pub fields: DiffusionFields,
}

impl UploadRequest {
    pub fn from_form(form: UploadForm, default_style: &str) -> Result<Self, IntakeError> {
        let UploadForm {
            photo,
            image,
            style,
            control_type,
            height,
            width,
            seed,
        } = form;

        let fields = DiffusionFields {
            control_type: text(&control_type).map(str::to_string),
            height: text(&height).map(str::to_string),
            width: text(&width).map(str::to_string),
            seed: text(&seed).map(str::to_string),
        };
        let style = text(&style).unwrap_or(default_style).to_string();

        let temp = photo.or(image).ok_or(IntakeError::MissingFile)?;
        let file = UploadedFile::from_temp(temp)?;
        Ok(UploadRequest { file, style, fields })
    }
}

// Trimmed field value, blank counts as absent
fn text(field: &Option<Text<String>>) -> Option<&str> {
    field.as_ref().map(|value| value.as_str().trim()).filter(|value| !value.is_empty())
}

pub fn parse_dimension(name: &'static str, value: Option<&str>, default: u32) -> Result<u32, IntakeError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    let parsed: u32 = raw.parse().map_err(|_| IntakeError::InvalidParameter {
        name,
        reason: format!("{:?} is not a positive integer", raw),
    })?;
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&parsed) {
        return Err(IntakeError::InvalidParameter {
            name,
            reason: format!("{} is outside {}..={}", parsed, MIN_DIMENSION, MAX_DIMENSION),
        });
    }
    Ok(parsed)
}

pub fn parse_seed(value: Option<&str>, default: u64) -> Result<u64, IntakeError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| IntakeError::InvalidParameter {
            name: "seed",
            reason: format!("{:?} is not a non-negative integer", raw),
        }),
    }
}

// Malformed or oversized multipart bodies get the same JSON error shape as the handlers.
pub fn multipart_form_config(config: &Config) -> MultipartFormConfig {
    MultipartFormConfig::default()
        .total_limit(config.max_upload_bytes)
        .error_handler(|err, req| {
            warn!("Rejected multipart body on {}: {}", req.path(), err);
            let envelope = Envelope::for_path(req.path());
            let response: HttpResponse = envelope.failure(
                actix_web::http::StatusCode::BAD_REQUEST,
                &format!("Invalid upload: {}", err),
            );
            InternalError::from_response(err, response).into()
        })
}

pub fn temp_file_config(config: &Config) -> TempFileConfig {
    match &config.upload_dir {
        Some(dir) => TempFileConfig::default().directory(dir),
        None => TempFileConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_default_when_absent() {
        assert_eq!(parse_dimension("height", None, 256), Ok(256));
    }

    #[test]
    fn dimensions_accept_the_supported_range() {
        assert_eq!(parse_dimension("width", Some("64"), 256), Ok(64));
        assert_eq!(parse_dimension("width", Some("1024"), 256), Ok(1024));
    }

    #[test]
    fn dimensions_reject_out_of_range_and_garbage() {
        for raw in ["0", "63", "1025", "-5", "12.5", "big"] {
            assert!(
                matches!(
                    parse_dimension("height", Some(raw), 256),
                    Err(IntakeError::InvalidParameter { name: "height", .. })
                ),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn seed_accepts_any_u64() {
        assert_eq!(parse_seed(None, 3), Ok(3));
        assert_eq!(parse_seed(Some("0"), 3), Ok(0));
        assert_eq!(parse_seed(Some("18446744073709551615"), 3), Ok(u64::MAX));
        assert!(parse_seed(Some("-1"), 3).is_err());
    }

    #[test]
    fn fields_resolve_against_the_configured_defaults() {
        let defaults = DiffusionSettings::default();
        let fields = DiffusionFields {
            width: Some("512".to_string()),
            seed: Some("42".to_string()),
            ..Default::default()
        };
        let params = fields.resolve(&defaults).unwrap();
        assert_eq!(params.height, defaults.height);
        assert_eq!(params.width, 512);
        assert_eq!(params.seed, 42);
        assert_eq!(params.control_type, defaults.control_type);
    }

    #[test]
    fn invalid_fields_only_fail_on_resolve() {
        let fields = DiffusionFields {
            height: Some("2048".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            fields.resolve(&DiffusionSettings::default()),
            Err(IntakeError::InvalidParameter { name: "height", .. })
        ));
    }

    #[test]
    fn closing_removes_the_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = NamedTempFile::new_in(dir.path()).unwrap();
        std::fs::write(file.path(), b"jpeg").unwrap();
        let temp = TempFile {
            file,
            content_type: Some("image/jpeg".parse().unwrap()),
            file_name: Some("me.jpg".to_string()),
            size: 4,
        };

        let upload = UploadedFile::from_temp(temp).unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        upload.close();
        assert!(!path.exists());
    }

    #[test]
    fn dropping_removes_the_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = NamedTempFile::new_in(dir.path()).unwrap();
        let path = file.path().to_path_buf();
        let temp = TempFile {
            file,
            content_type: None,
            file_name: None,
            size: 10,
        };

        {
            let _upload = UploadedFile::from_temp(temp).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn empty_upload_is_rejected() {
        let temp = TempFile {
            file: NamedTempFile::new().unwrap(),
            content_type: None,
            file_name: None,
            size: 0,
        };
        assert!(matches!(UploadedFile::from_temp(temp), Err(IntakeError::EmptyFile)));
    }

    #[actix_rt::test]
    async fn payload_carries_bytes_and_metadata() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"\x89PNG").unwrap();
        let temp = TempFile {
            file,
            content_type: Some("image/png".parse().unwrap()),
            file_name: Some("cat.png".to_string()),
            size: 4,
        };

        let upload = UploadedFile::from_temp(temp).unwrap();
        let payload = upload.read_payload().await.unwrap();
        assert_eq!(&payload.bytes[..], b"\x89PNG");
        assert_eq!(payload.mime_type.as_deref(), Some("image/png"));
        assert_eq!(payload.file_name.as_deref(), Some("cat.png"));
        upload.close();
    }
}
