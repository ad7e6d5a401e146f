//! In-memory document store backed by DashMap.

use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::StorageError;
use crate::traits::DocumentStore;
use crate::types::{Filter, Page, PageRequest, SortOrder, compare_values};

type StorageKey = String; // Format: "collection/id"

fn make_storage_key(collection: &str, id: &str) -> StorageKey {
    format!("{collection}/{id}")
}

#[derive(Debug, Clone)]
struct StoredDocument {
    /// Insertion sequence, used as the natural order and as a sort tie-breaker.
    seq: u64,
    body: Value,
}

/// In-memory document store.
///
/// All collections share one concurrent map keyed by `collection/id`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Arc<DashMap<StorageKey, StoredDocument>>,
    sequence: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> Result<String, StorageError> {
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| StorageError::internal(format!("failed to format timestamp: {e}")))
    }

    /// Snapshot of the matching documents of a collection in insertion order.
    fn scan(&self, collection: &str, filter: &Filter) -> Vec<StoredDocument> {
        let prefix = format!("{collection}/");
        let mut matched: Vec<StoredDocument> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix) && filter.matches(&entry.value().body))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by_key(|doc| doc.seq);
        matched
    }
}

fn compare_by_field(
    a: &StoredDocument,
    b: &StoredDocument,
    field: &str,
    order: SortOrder,
) -> Ordering {
    // Documents missing the field sort last in either direction.
    match (a.body.get(field), b.body.get(field)) {
        (Some(x), Some(y)) => {
            let ord = compare_values(x, y).unwrap_or(Ordering::Equal);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, collection: &str, document: Value) -> Result<Value, StorageError> {
        let Value::Object(mut fields) = document else {
            return Err(StorageError::invalid("document must be a JSON object"));
        };

        let id = uuid::Uuid::new_v4().simple().to_string();
        let now = Self::now()?;
        fields.insert("id".into(), Value::String(id.clone()));
        fields.insert("createdAt".into(), Value::String(now.clone()));
        fields.insert("updatedAt".into(), Value::String(now));

        let key = make_storage_key(collection, &id);
        if self.data.contains_key(&key) {
            return Err(StorageError::already_exists(collection, id));
        }

        let body = Value::Object(fields);
        let seq = self.sequence.fetch_add(1, AtomicOrdering::SeqCst);
        self.data.insert(
            key,
            StoredDocument {
                seq,
                body: body.clone(),
            },
        );
        tracing::debug!(collection = %collection, id = %id, "document inserted");
        Ok(body)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let key = make_storage_key(collection, id);
        Ok(self.data.get(&key).map(|doc| doc.body.clone()))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Value,
    ) -> Result<Option<Value>, StorageError> {
        let Value::Object(changes) = changes else {
            return Err(StorageError::invalid("changes must be a JSON object"));
        };

        let key = make_storage_key(collection, id);
        let Some(mut entry) = self.data.get_mut(&key) else {
            return Ok(None);
        };
        let now = Self::now()?;
        if let Value::Object(fields) = &mut entry.body {
            for (field, value) in changes {
                if matches!(field.as_str(), "id" | "createdAt" | "updatedAt") {
                    continue;
                }
                fields.insert(field, value);
            }
            fields.insert("updatedAt".into(), Value::String(now));
        }
        tracing::debug!(collection = %collection, id = %id, "document updated");
        Ok(Some(entry.body.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let key = make_storage_key(collection, id);
        let removed = self.data.remove(&key).is_some();
        if removed {
            tracing::debug!(collection = %collection, id = %id, "document deleted");
        }
        Ok(removed)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        page: &PageRequest,
    ) -> Result<Page<Value>, StorageError> {
        let mut matched = self.scan(collection, filter);
        if let Some(sort) = &page.sort {
            // Stable sort keeps insertion order among equal keys.
            matched.sort_by(|a, b| compare_by_field(a, b, &sort.field, sort.order));
        }

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .map(|doc| doc.body)
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>, StorageError> {
        Ok(self
            .scan(collection, filter)
            .into_iter()
            .next()
            .map(|doc| doc.body))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError> {
        Ok(self.scan(collection, filter).len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
