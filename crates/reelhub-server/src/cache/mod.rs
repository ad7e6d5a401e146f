//! Response caching for entity listings.
//!
//! ## Architecture
//!
//! - **Backend**: in-process DashMap or shared Redis, chosen at startup
//! - **Keys**: one entry per exact listing query (entity, scope, page, sort)
//! - **Tracker**: per-entity last-update markers for staleness checks
//! - **Interceptor**: axum middleware serving hits and writing back misses
//! - **Invalidator**: axum middleware dropping listings after writes
//!
//! ```text
//! GET listing  -> interceptor -> backend hit? -> cached bytes (X-Cache: HIT)
//!                                    | miss
//!                                    v
//!                                 handler -> response (X-Cache: MISS)
//!                                    `-> spawned write-back
//! POST/PUT/DELETE -> handler -> 2xx? -> mark entity, delete `{entity}:*`
//!                                       and `{related}:*`
//! ```
//!
//! ## Graceful Degradation
//!
//! If Redis is unavailable or disabled the cache runs in-process. Backend
//! errors are misses or skipped writes and never reach the client.

pub mod backend;
pub mod interceptor;
pub mod invalidator;
pub mod keys;
pub mod tracker;

use std::sync::Arc;
use std::time::Duration;

pub use backend::{CacheBackend, CacheStats, CachedEntry};
pub use interceptor::{CachedPayload, cache_responses};
pub use invalidator::{CacheInvalidator, invalidate_on_write};
pub use keys::{CacheKey, CacheableListing, ListParams, ListScope};
pub use tracker::EntityUpdateTracker;

use crate::config::CacheConfig;

/// Runtime settings of the response cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub no_store_on_miss: bool,
    pub max_body_bytes: usize,
}

impl From<&CacheConfig> for CacheSettings {
    fn from(cfg: &CacheConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            ttl: cfg.ttl(),
            no_store_on_miss: cfg.no_store_on_miss,
            max_body_bytes: cfg.max_body_bytes,
        }
    }
}

/// Everything the cache middlewares share. Cheap to clone.
#[derive(Clone)]
pub struct ResponseCache {
    backend: CacheBackend,
    tracker: EntityUpdateTracker,
    invalidator: CacheInvalidator,
    settings: Arc<CacheSettings>,
}

impl ResponseCache {
    pub fn new(backend: CacheBackend, cfg: &CacheConfig) -> Self {
        let tracker = EntityUpdateTracker::new(backend.clone(), cfg.marker_ttl());
        let invalidator = CacheInvalidator::new(backend.clone(), tracker.clone());
        Self {
            backend,
            tracker,
            invalidator,
            settings: Arc::new(CacheSettings::from(cfg)),
        }
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    pub fn tracker(&self) -> &EntityUpdateTracker {
        &self.tracker
    }

    pub fn invalidator(&self) -> &CacheInvalidator {
        &self.invalidator
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }
}
