use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::models::MetricError;
use crate::security::SecurityError;
use crate::storage::StoreError;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Unknown kind, bad literal, payload mismatch or malformed JSON
    Validation(String),
    /// Signature mismatch or undecryptable body
    Integrity(String),
    /// No such metric
    NotFound(String),
    /// Repository failure after retries
    Storage(String),
    /// Internal server error
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::Integrity(msg) => write!(f, "Integrity error: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Integrity(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        if let Some(reason) = rejection_reason(&self) {
            crate::metrics::record_rejected(reason);
        }

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::Validation(_) => "validation_error",
        AppError::Integrity(_) => "integrity_error",
        AppError::NotFound(_) => "not_found",
        AppError::Storage(_) => "storage_error",
        AppError::Internal(_) => "internal_error",
    }
}

fn rejection_reason(error: &AppError) -> Option<&'static str> {
    match error {
        AppError::Validation(_) => Some("validation"),
        AppError::Integrity(_) => Some("integrity"),
        AppError::NotFound(_) => Some("not_found"),
        AppError::Storage(_) | AppError::Internal(_) => None,
    }
}

impl From<MetricError> for AppError {
    fn from(err: MetricError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(format!("metric '{}' not found", id)),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::Key(msg) => Self::Internal(msg),
            other => Self::Integrity(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
