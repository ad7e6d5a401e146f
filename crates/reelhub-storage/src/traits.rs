//! The document store contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{Filter, Page, PageRequest};

/// Contract for a document store backend.
///
/// Documents are JSON objects. The store owns the `id`, `createdAt` and
/// `updatedAt` fields: callers never set them. Implementations must be
/// thread-safe (`Send + Sync`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Invalid` if `document` is not a JSON object.
    async fn insert(&self, collection: &str, document: Value) -> Result<Value, StorageError>;

    /// Reads a document by id. Missing documents are `Ok(None)`.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StorageError>;

    /// Merges the top-level fields of `changes` into the stored document.
    ///
    /// Returns `Ok(None)` if no document has this id.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Value,
    ) -> Result<Option<Value>, StorageError>;

    /// Deletes a document. Returns `false` if it did not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError>;

    /// Returns one page of documents matching `filter`.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        page: &PageRequest,
    ) -> Result<Page<Value>, StorageError>;

    /// Returns the first document (in insertion order) matching `filter`.
    async fn find_one(&self, collection: &str, filter: &Filter)
    -> Result<Option<Value>, StorageError>;

    /// Counts documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError>;

    /// Returns whether any document matches `filter`.
    async fn exists(&self, collection: &str, filter: &Filter) -> Result<bool, StorageError> {
        Ok(self.find_one(collection, filter).await?.is_some())
    }

    /// Name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}
