//! Invalidate-on-write for cached listings.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};

use super::{ResponseCache, backend::CacheBackend, keys, tracker::EntityUpdateTracker};
use crate::entity::EntityType;

#[derive(Clone)]
pub struct CacheInvalidator {
    backend: CacheBackend,
    tracker: EntityUpdateTracker,
}

impl CacheInvalidator {
    pub fn new(backend: CacheBackend, tracker: EntityUpdateTracker) -> Self {
        Self { backend, tracker }
    }

    /// Drops every cached listing of `entity` and of its related entity
    /// types. Returns the number of entries deleted.
    ///
    /// The update marker is written before any delete so a write-back that
    /// races with this call is recognised as stale. Backend failures are
    /// logged by the backend and count as zero deletions.
    pub async fn invalidate(&self, entity: EntityType) -> usize {
        self.tracker.mark_updated(entity).await;

        let mut deleted = self
            .backend
            .delete_by_pattern(&keys::invalidation_pattern(entity))
            .await;
        for related in entity.related() {
            deleted += self
                .backend
                .delete_by_pattern(&keys::invalidation_pattern(*related))
                .await;
        }

        crate::metrics::record_cache_invalidation(entity.as_str(), deleted);
        tracing::debug!(entity = %entity, deleted, "cache invalidated");
        deleted
    }
}

/// Runs the handler and, when a write to an entity route succeeded,
/// invalidates that entity's cached listings before responding.
///
/// The response is returned unchanged whatever invalidation does.
pub async fn invalidate_on_write(
    State(cache): State<ResponseCache>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let is_write = matches!(
        *req.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    let entity = if is_write {
        keys::entity_for_path(req.uri().path())
    } else {
        None
    };

    let res = next.run(req).await;

    if let Some(entity) = entity
        && res.status().is_success()
    {
        cache.invalidator().invalidate(entity).await;
    }
    res
}
