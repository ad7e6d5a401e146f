//! API errors mapped to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reelhub_storage::{ErrorCategory, StorageError};
use serde_json::{Value, json};
use thiserror::Error;

use crate::models::response::timestamp_now;

/// High-level API errors to be mapped to HTTP responses and the error envelope
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            details: None,
        }
    }
    pub fn validation_with(msg: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: msg.into(),
            details: Some(details),
        }
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(e) => match e.category() {
                ErrorCategory::NotFound => StatusCode::NOT_FOUND,
                ErrorCategory::Conflict => StatusCode::CONFLICT,
                ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                ErrorCategory::Infrastructure => StatusCode::SERVICE_UNAVAILABLE,
                ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message shown to clients. Internal storage failures are not exposed.
    fn public_message(&self) -> String {
        match self {
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::NotFound(msg) | ApiError::Conflict(msg) => msg.clone(),
            ApiError::Storage(e) => match e.category() {
                ErrorCategory::Infrastructure => "Storage temporarily unavailable".to_string(),
                ErrorCategory::Internal => "Internal server error".to_string(),
                _ => e.to_string(),
            },
        }
    }

    pub fn to_body(&self) -> Value {
        let status = self.status_code();
        let mut body = json!({
            "status": "error",
            "code": status.as_u16(),
            "message": self.public_message(),
            "timestamp": timestamp_now(),
        });
        if let ApiError::Validation {
            details: Some(details),
            ..
        } = self
        {
            body["details"] = details.clone();
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_status_codes() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::validation("x"), StatusCode::BAD_REQUEST),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (
                StorageError::already_exists("movies", "1").into(),
                StatusCode::CONFLICT,
            ),
            (
                StorageError::connection("down").into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StorageError::internal("boom").into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{err}");
        }
    }

    #[test]
    fn body_has_envelope_fields() {
        let body = ApiError::validation_with("bad", json!([{"field": "title"}])).to_body();
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], 400);
        assert_eq!(body["message"], "bad");
        assert_eq!(body["details"][0]["field"], "title");
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn internal_details_are_hidden() {
        let body = ApiError::from(StorageError::internal("secret dsn")).to_body();
        assert_eq!(body["message"], "Internal server error");
    }
}
