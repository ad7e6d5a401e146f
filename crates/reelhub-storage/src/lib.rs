//! # reelhub-storage
//!
//! Document store abstraction for the ReelHub service.
//!
//! Collections hold schemaless JSON documents. Every stored document carries
//! a generated `id` plus `createdAt`/`updatedAt` stamps in RFC 3339 form.
//!
//! ## Example
//!
//! ```ignore
//! use reelhub_storage::{DocumentStore, Filter, PageRequest};
//!
//! async fn dramas(store: &dyn DocumentStore) -> StorageResult<u64> {
//!     store.count("movies", &Filter::new().eq("genre", "Drama")).await
//! }
//! ```
//!
//! Implement [`DocumentStore`] to plug in another backend. [`InMemoryStore`]
//! is the backend the server uses today.

mod error;
mod memory;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use memory::InMemoryStore;
pub use traits::DocumentStore;
pub use types::{Condition, Filter, Page, PageRequest, SortOrder, SortSpec};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Shared handle to a document store.
pub type DynStore = std::sync::Arc<dyn DocumentStore>;
