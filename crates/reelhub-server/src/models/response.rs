//! Success envelope shared by every API response.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current UTC time in RFC 3339 form.
pub fn timestamp_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// `{ status, code, message, timestamp, path, data }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub code: u16,
    pub message: String,
    pub timestamp: String,
    pub path: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, path: &str, data: T) -> Self {
        Self {
            status: "success",
            code: status.as_u16(),
            message: message.into(),
            timestamp: timestamp_now(),
            path: path.to_string(),
            data,
        }
    }

    pub fn ok(message: impl Into<String>, path: &str, data: T) -> Self {
        Self::new(StatusCode::OK, message, path, data)
    }

    pub fn created(message: impl Into<String>, path: &str, data: T) -> Self {
        Self::new(StatusCode::CREATED, message, path, data)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
