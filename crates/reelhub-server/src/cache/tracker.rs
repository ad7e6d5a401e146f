//! Last-modified markers per entity type.
//!
//! Markers live in the cache backend under `entity:{type}:updated_at` as
//! UTC unix nanoseconds. They back the staleness check on cache hits and let
//! a late write-back notice that the data it carries predates a write.

use std::time::Duration;

use time::OffsetDateTime;

use super::backend::CacheBackend;
use crate::entity::EntityType;

#[derive(Clone)]
pub struct EntityUpdateTracker {
    backend: CacheBackend,
    marker_ttl: Duration,
}

impl EntityUpdateTracker {
    pub fn new(backend: CacheBackend, marker_ttl: Duration) -> Self {
        Self {
            backend,
            marker_ttl,
        }
    }

    pub fn marker_key(entity: EntityType) -> String {
        format!("entity:{}:updated_at", entity.as_str())
    }

    /// Records now as the last update of `entity` and returns it.
    pub async fn mark_updated(&self, entity: EntityType) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let stored = self
            .backend
            .set_with_ttl(
                &Self::marker_key(entity),
                now.unix_timestamp_nanos().to_string().into_bytes(),
                self.marker_ttl,
            )
            .await;
        if !stored {
            tracing::warn!(entity = %entity, "failed to record entity update marker");
        }
        now
    }

    pub async fn last_updated(&self, entity: EntityType) -> Option<OffsetDateTime> {
        let raw = self.backend.get(&Self::marker_key(entity)).await?;
        let parsed = std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.parse::<i128>().ok())
            .and_then(|nanos| OffsetDateTime::from_unix_timestamp_nanos(nanos).ok());
        if parsed.is_none() {
            tracing::warn!(entity = %entity, "ignoring malformed entity update marker");
        }
        parsed
    }

    /// Latest marker among `entity` and the entity types related to it.
    ///
    /// A listing of `entity` may embed data of its related types, so a write
    /// to any of them makes it stale.
    pub async fn latest_change(&self, entity: EntityType) -> Option<OffsetDateTime> {
        let mut latest = self.last_updated(entity).await;
        for related in entity.related() {
            let marker = self.last_updated(*related).await;
            latest = latest.max(marker);
        }
        latest
    }
}
