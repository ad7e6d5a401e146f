//! Read-through response cache middleware.

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode, header},
    middleware::Next,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{ResponseCache, keys::CacheKey, keys::CacheableListing};
use crate::entity::EntityType;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// What is stored for one cached response, MessagePack-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPayload {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Start of the request that produced the body, UTC unix nanoseconds.
    pub cached_at: i64,
}

impl CachedPayload {
    fn cached_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.cached_at)).ok()
    }
}

fn unix_nanos(ts: OffsetDateTime) -> i64 {
    i64::try_from(ts.unix_timestamp_nanos()).unwrap_or(i64::MAX)
}

impl ResponseCache {
    /// Fresh cached payload for `key`, if any.
    ///
    /// An entry written before the latest update marker of its entity (or a
    /// related one) is stale and reported as a miss.
    pub async fn lookup(&self, entity: EntityType, key: &CacheKey) -> Option<CachedPayload> {
        let raw = self.backend().get(key.as_str()).await?;
        let payload: CachedPayload = match rmp_serde::from_slice(&raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "undecodable cache entry, treating as miss");
                return None;
            }
        };

        let cached_at = payload.cached_at()?;
        if let Some(changed) = self.tracker().latest_change(entity).await
            && changed >= cached_at
        {
            tracing::debug!(key = %key, "cache entry predates last update");
            return None;
        }
        Some(payload)
    }

    /// Stores a payload unless a write to the entity happened after the
    /// request that produced it started. Returns whether it was stored.
    pub async fn store(&self, entity: EntityType, key: &CacheKey, payload: CachedPayload) -> bool {
        if let Some(changed) = self.tracker().latest_change(entity).await
            && payload.cached_at().is_none_or(|started| changed >= started)
        {
            tracing::debug!(key = %key, "dropping write-back older than last update");
            return false;
        }

        let bytes = match rmp_serde::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode cache entry");
                return false;
            }
        };
        self.backend()
            .set_with_ttl(key.as_str(), bytes, self.settings().ttl)
            .await
    }
}

/// Serves cached listings and populates the cache from live responses.
///
/// Only `GET`/`HEAD` requests for entity listings are considered; everything
/// else goes straight to the handler. Cache failures never change the
/// response the handler produced.
pub async fn cache_responses(
    State(cache): State<ResponseCache>,
    req: Request<Body>,
    next: Next,
) -> Response<Body> {
    if !cache.settings().enabled || !matches!(*req.method(), Method::GET | Method::HEAD) {
        return next.run(req).await;
    }
    let Some(listing) = CacheableListing::from_request(req.uri().path(), req.uri().query())
    else {
        return next.run(req).await;
    };

    let started = OffsetDateTime::now_utc();
    let key = listing.key();

    if let Some(payload) = cache.lookup(listing.entity, &key).await {
        crate::metrics::record_cache_hit(listing.entity.as_str());
        tracing::debug!(key = %key, "cache hit");
        return hit_response(payload);
    }

    crate::metrics::record_cache_miss(listing.entity.as_str());
    tracing::debug!(key = %key, "cache miss");

    let write_back = req.method() == Method::GET;
    let res = next.run(req).await;
    let mut res = if write_back && res.status().is_success() {
        capture(&cache, listing.entity, key, started, res).await
    } else {
        res
    };

    res.headers_mut()
        .insert(X_CACHE, HeaderValue::from_static("MISS"));
    if cache.settings().no_store_on_miss {
        res.headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
    res
}

fn hit_response(payload: CachedPayload) -> Response<Body> {
    let mut res = Response::new(Body::from(payload.body));
    if let Some(content_type) = payload
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
    {
        res.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    res.headers_mut()
        .insert(X_CACHE, HeaderValue::from_static("HIT"));
    res
}

/// Buffers a successful response, hands the same bytes to the client and
/// spawns the cache write. Bodies of unknown or excessive size are passed
/// through uncached.
async fn capture(
    cache: &ResponseCache,
    entity: EntityType,
    key: CacheKey,
    started: OffsetDateTime,
    res: Response<Body>,
) -> Response<Body> {
    let max = cache.settings().max_body_bytes;
    let fits = res
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= max as u64);
    if !fits {
        tracing::debug!(key = %key, "response too large or unsized, not caching");
        return res;
    }

    let (parts, body) = res.into_parts();
    let bytes: Bytes = match axum::body::to_bytes(body, max).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "failed to buffer response body");
            return body_lost();
        }
    };

    let payload = CachedPayload {
        content_type: parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: bytes.to_vec(),
        cached_at: unix_nanos(started),
    };

    // Detached so a client disconnect does not cancel the write.
    let cache = cache.clone();
    tokio::spawn(async move {
        if cache.store(entity, &key, payload).await {
            tracing::debug!(key = %key, "cache populated");
        }
    });

    Response::from_parts(parts, Body::from(bytes))
}

/// The handler's body stream broke while it was being buffered. The bytes
/// already read cannot be replayed, so the client gets an error instead of
/// the original headers over a truncated body.
fn body_lost() -> Response<Body> {
    crate::middleware::error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to read response body",
    )
}
