//! Request and response types of the entity API.

pub mod director;
pub mod movie;
pub mod pagination;
pub mod response;

use axum::{Json, extract::rejection::JsonRejection};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use time::{Date, macros::format_description};

use crate::error::ApiError;
use reelhub_storage::StorageError;

pub use director::{Director, DirectorChanges, NewDirector};
pub use movie::{Movie, MovieChanges, NewMovie};
pub use pagination::ListQuery;
pub use response::ApiResponse;

/// Decodes a JSON request body into `T`, reporting every failure as a 400.
pub fn parse_body<T: DeserializeOwned>(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<T, ApiError> {
    let Json(value) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    if !value.is_object() {
        return Err(ApiError::validation("Request body must be a JSON object"));
    }
    serde_json::from_value(value)
        .map_err(|e| ApiError::validation(format!("Validation failed: {e}")))
}

/// Converts a stored document into its typed form.
pub fn from_document<T: DeserializeOwned>(doc: Value) -> Result<T, ApiError> {
    serde_json::from_value(doc)
        .map_err(|e| StorageError::internal(format!("malformed stored document: {e}")).into())
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value, format_description!("[year]-[month]-[day]")).ok()
}

/// Collects field violations so a client sees all of them at once.
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<Value>);

impl Violations {
    pub(crate) fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(json!({ "field": field, "message": message.into() }));
    }

    pub(crate) fn text(&mut self, field: &str, value: &str, max: usize) {
        let len = value.chars().count();
        if len == 0 {
            self.push(field, "must not be empty");
        } else if len > max {
            self.push(field, format!("must be at most {max} characters"));
        }
    }

    pub(crate) fn date(&mut self, field: &str, value: &str) {
        if parse_date(value).is_none() {
            self.push(field, "must be a valid date in YYYY-MM-DD format");
        }
    }

    pub(crate) fn range(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if !(min..=max).contains(&value) {
            self.push(field, format!("must be between {min} and {max}"));
        }
    }

    pub(crate) fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_with(
                "Validation failed",
                Value::Array(self.0),
            ))
        }
    }
}
