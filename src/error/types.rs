use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

/// Request-level failures. Per-file failures never surface here, they are
/// folded into the batch outcome list instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("File too large: {size}MB exceeds limit of {limit}MB")]
    FileTooLarge { size: usize, limit: usize },

    #[error("Request body exceeds limit of {limit}MB")]
    PayloadTooLarge { limit: usize },

    #[error("Invalid file format: {message}")]
    InvalidFile { message: String },

    #[error("Rate limit exceeded: maximum concurrent requests reached")]
    RateLimitExceeded,

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Download not found: {id}")]
    DownloadNotFound { id: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Service unavailable: {service}")]
    ServiceUnavailable { service: String },
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AppError::InvalidFile { .. } => "INVALID_FILE",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::Internal { .. } => "INTERNAL_ERROR",
            AppError::MissingFile => "MISSING_FILE",
            AppError::DownloadNotFound { .. } => "DOWNLOAD_NOT_FOUND",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::ConfigError { .. } => "CONFIG_ERROR",
            AppError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidFile { .. } => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::DownloadNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::ConfigError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();
        let request_id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().to_rfc3339();

        tracing::error!(
            error_code = error_code,
            status_code = %status,
            request_id = %request_id,
            error_message = %message,
            "API error occurred"
        );

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
                "request_id": request_id,
                "timestamp": timestamp
            },
            "data": null
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AppError::ConfigError {
            message: message.into(),
        }
    }

    pub fn service_unavailable(service: impl Into<String>) -> Self {
        AppError::ServiceUnavailable {
            service: service.into(),
        }
    }

    pub fn invalid_file(message: impl Into<String>) -> Self {
        AppError::InvalidFile {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }
}

/// Coarse classification of a per-file failure, reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Decode,
    Recognition,
    Filesystem,
    InvalidFile,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Decode => "decode",
            FailureKind::Recognition => "recognition",
            FailureKind::Filesystem => "filesystem",
            FailureKind::InvalidFile => "invalid_file",
        }
    }
}

/// Failure of one step of the per-file pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("PDF could not be decoded: {message}")]
    Decode { message: String },

    #[error("OCR failed: {message}")]
    Recognition { message: String },

    #[error("Filesystem operation failed: {message}")]
    Filesystem { message: String },

    #[error("Invalid file: {message}")]
    InvalidFile { message: String },
}

impl PipelineError {
    pub fn decode(message: impl Into<String>) -> Self {
        PipelineError::Decode {
            message: message.into(),
        }
    }

    pub fn recognition(message: impl Into<String>) -> Self {
        PipelineError::Recognition {
            message: message.into(),
        }
    }

    pub fn filesystem(message: impl Into<String>) -> Self {
        PipelineError::Filesystem {
            message: message.into(),
        }
    }

    pub fn invalid_file(message: impl Into<String>) -> Self {
        PipelineError::InvalidFile {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Decode { .. } => FailureKind::Decode,
            PipelineError::Recognition { .. } => FailureKind::Recognition,
            PipelineError::Filesystem { .. } => FailureKind::Filesystem,
            PipelineError::InvalidFile { .. } => FailureKind::InvalidFile,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Filesystem {
            message: err.to_string(),
        }
    }
}
