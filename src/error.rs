use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// No Authorization header was supplied.
    #[error("Missing bearer token")]
    MissingCredential,

    /// The bearer token has expired.
    #[error("Token expired, please log in again")]
    ExpiredCredential,

    /// The Authorization header is not a well-formed bearer credential.
    #[error("Invalid or malformed token")]
    MalformedCredential,

    /// The token could not be matched to any account.
    #[error("Token verification failed")]
    VerificationFailed,

    /// Resource not found (or not owned by the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid request input.
    #[error("{0}")]
    Validation(String),

    /// Uploaded file exceeds the configured size ceiling.
    #[error("File too large. Max {0} bytes allowed")]
    PayloadTooLarge(u64),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error code carried in the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingCredential => "missing_credential",
            AppError::ExpiredCredential => "expired_credential",
            AppError::MalformedCredential => "malformed_credential",
            AppError::VerificationFailed => "verification_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::Io(_) => "io",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredential
            | AppError::ExpiredCredential
            | AppError::MalformedCredential
            | AppError::VerificationFailed => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body returned from every handler.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        } else {
            tracing::debug!(error = %self, code = self.code(), "Request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
