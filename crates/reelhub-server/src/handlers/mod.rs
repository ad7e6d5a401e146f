use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use reelhub_storage::Filter;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::cache::CacheStats;
use crate::entity::EntityType;
use crate::error::ApiError;
use crate::models::{ListQuery, parse_date};
use crate::server::AppState;

pub mod directors;
pub mod movies;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    storage: &'static str,
    cache: CacheStats,
    redis_available: bool,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "ReelHub API",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready as soon as the store answers. Cache mode is informational: a
/// degraded cache never makes the service unready.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.cache.backend();
    let body = ReadyResponse {
        status: "ready",
        storage: state.store.backend_name(),
        cache: cache.stats(),
        redis_available: cache.is_redis_available().await,
    };
    (StatusCode::OK, Json(body))
}

pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

/// Fallback for unknown routes, in the API error envelope.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

/// Loads a director or fails with 404.
pub(crate) async fn require_director(state: &AppState, id: &str) -> Result<Value, ApiError> {
    state
        .store
        .get(EntityType::Directors.collection(), id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Director with ID {id} not found")))
}

/// `?from=YYYY-MM-DD&to=YYYY-MM-DD` plus the usual listing parameters.
#[derive(Debug, Deserialize)]
pub struct DateRange {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(flatten)]
    pub list: ListQuery,
}

impl DateRange {
    /// Inclusive range filter on `field`. Both bounds are required and
    /// `from` must not be after `to`.
    pub fn filter(&self, field: &str) -> Result<Filter, ApiError> {
        let (Some(from), Some(to)) = (self.from.as_deref(), self.to.as_deref()) else {
            return Err(ApiError::validation("Both 'from' and 'to' dates are required"));
        };
        let (from, to) = (from.trim(), to.trim());
        let (Some(from_date), Some(to_date)) = (parse_date(from), parse_date(to)) else {
            return Err(ApiError::validation("Dates must be in YYYY-MM-DD format"));
        };
        if from_date > to_date {
            return Err(ApiError::validation("Start date must be before end date"));
        }

        // YYYY-MM-DD strings order the same way as the dates they encode.
        Ok(Filter::new().range(field, Some(json!(from)), Some(json!(to))))
    }
}
