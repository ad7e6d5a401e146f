//! Storage error types.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested document was not found.
    #[error("Document not found: {collection}/{id}")]
    NotFound {
        /// Collection that was searched.
        collection: String,
        /// The id that was not found.
        id: String,
    },

    /// A document with the same id already exists.
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    /// The document or query is malformed.
    #[error("Invalid document: {message}")]
    Invalid { message: String },

    /// The backend could not be reached.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn already_exists(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            collection: collection.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the error category for logging and status mapping.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::Invalid { .. } => ErrorCategory::Validation,
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
