// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::otp::OtpChannel;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Conflict(String),

    #[error("{} not verified", .0.label())]
    Unverified(OtpChannel),

    #[error("Incorrect or expired OTP")]
    InvalidOrExpired,

    #[error("Session not found. Please request a new OTP.")]
    OtpSessionNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    // Unknown account, unapproved account and bad password all land here.
    #[error("Invalid credentials or account not approved")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("{0}")]
    InvalidState(String),

    #[error("Notification delivery failed: {0}")]
    Upstream(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_kind) = match &self {
            AppError::Conflict(_) => (StatusCode::BAD_REQUEST, "conflict"),
            AppError::Unverified(_) => (StatusCode::BAD_REQUEST, "unverified"),
            AppError::InvalidOrExpired => (StatusCode::BAD_REQUEST, "invalid_or_expired"),
            AppError::OtpSessionNotFound => (StatusCode::BAD_REQUEST, "no_session"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            AppError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "upstream"),
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
            AppError::ConfigurationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        // Store and provider details stay in the logs.
        let message = match &self {
            AppError::MongoDB(_) | AppError::Internal(_) | AppError::ConfigurationError(_) => {
                tracing::error!(error = %self, "request failed");
                "Server Error".to_string()
            }
            AppError::Upstream(_) => {
                tracing::error!(error = %self, "notification gateway failure");
                "Failed to send notification".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": error_kind,
            "message": message,
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("bcrypt: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(format!("token signing failed: {}", err))
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        AppError::InvalidState(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        AppError::Upstream(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// True when Mongo rejected a write because of a unique index.
    pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
        use mongodb::error::{ErrorKind, WriteFailure};
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
            ErrorKind::Command(e) => e.code == 11000,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
