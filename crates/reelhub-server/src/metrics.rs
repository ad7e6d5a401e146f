//! Prometheus metrics for the ReelHub server.
//!
//! This module provides:
//! - HTTP request metrics (count, latency)
//! - Response cache metrics (hits, misses, invalidations)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Cache metrics
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_INVALIDATIONS_TOTAL: &str = "cache_invalidations_total";
    pub const CACHE_KEYS_DELETED_TOTAL: &str = "cache_keys_deleted_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// This should be called once at server startup.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics is served by the app itself
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

// =============================================================================
// HTTP Metrics
// =============================================================================

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };

    // Normalize path to avoid high cardinality
    let normalized_path = normalize_path(path);

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => normalized_path.clone(),
        "status" => status.to_string(),
        "status_class" => status_class.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => normalized_path
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Cache Metrics
// =============================================================================

/// Record a cache hit.
pub fn record_cache_hit(entity: &str) {
    counter!(names::CACHE_HITS_TOTAL, "entity" => entity.to_string()).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss(entity: &str) {
    counter!(names::CACHE_MISSES_TOTAL, "entity" => entity.to_string()).increment(1);
}

/// Record an invalidation triggered by a write and the keys it removed.
pub fn record_cache_invalidation(entity: &str, keys_deleted: usize) {
    counter!(names::CACHE_INVALIDATIONS_TOTAL, "entity" => entity.to_string()).increment(1);
    counter!(names::CACHE_KEYS_DELETED_TOTAL, "entity" => entity.to_string())
        .increment(keys_deleted as u64);
}

// =============================================================================
// Helpers
// =============================================================================

/// Normalize a path to reduce cardinality.
///
/// Replaces document ids and free-form lookup values with placeholders:
/// `/api/movies/4f1c...` -> `/api/movies/{id}`,
/// `/api/movies/genre/Drama` -> `/api/movies/genre/{genre}`.
fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    let mut normalized: Vec<String> = Vec::with_capacity(parts.len());

    for part in parts {
        let placeholder = match normalized.last().map(String::as_str) {
            Some("director") => Some("{directorId}"),
            Some("genre") => Some("{genre}"),
            Some("imdb") => Some("{imdbId}"),
            _ if is_likely_id(part) => Some("{id}"),
            _ => None,
        };
        normalized.push(placeholder.map_or_else(|| part.to_string(), str::to_string));
    }

    normalized.join("/")
}

/// Check if a string looks like an ID (UUID or numeric).
fn is_likely_id(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }

    // UUID pattern (with or without dashes)
    if s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4 {
        return true;
    }
    if s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        return true;
    }

    // Numeric ID
    s.chars().all(|c| c.is_ascii_digit())
}
