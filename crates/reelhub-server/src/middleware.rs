use std::time::Instant;

use axum::{
    Json,
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::models::response::timestamp_now;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request id, stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub HeaderValue);

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    // If the incoming request already has a usable request-id, preserve it; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&X_REQUEST_ID)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok())
        .unwrap_or_else(|| HeaderValue::from_static("unknown"));

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(RequestId(req_id_value.clone()));

    let mut res = next.run(req).await;

    // Add/propagate the request id header to response
    res.headers_mut().insert(X_REQUEST_ID, req_id_value);

    res
}

// Content negotiation middleware: responses are JSON, and POST/PUT/PATCH bodies must be JSON.
pub async fn content_negotiation(req: Request<Body>, next: Next) -> Response {
    let accepts_hdr = req.headers().get("accept").and_then(|v| v.to_str().ok());
    let accept_ok = accepts_hdr
        .map(|v| {
            let v = v.to_ascii_lowercase();
            v.contains("application/json") || v.contains("*/*") || v.contains("application/*")
        })
        .unwrap_or(true); // if missing, treat as ok per HTTP defaults

    if !accept_ok {
        return error_response(
            StatusCode::NOT_ACCEPTABLE,
            "Only application/json responses are available",
        );
    }

    let needs_body_type = matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH);

    if needs_body_type {
        let content_ok = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase().starts_with("application/json"))
            .unwrap_or(false);
        if !content_ok {
            return error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type must be application/json",
            );
        }
    }

    next.run(req).await
}

/// Records request count and latency by normalized path.
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let res = next.run(req).await;

    crate::metrics::record_http_request(
        method.as_str(),
        &path,
        res.status().as_u16(),
        start.elapsed(),
    );
    res
}

pub(crate) fn error_response(status: StatusCode, msg: &str) -> Response {
    let body = json!({
        "status": "error",
        "code": status.as_u16(),
        "message": msg,
        "timestamp": timestamp_now(),
    });
    (status, Json(body)).into_response()
}
