//! Error types for merged file storage.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while writing merged files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object not found.
    #[error("object not found: {name}")]
    NotFound { name: String },

    /// Invalid store specification (URL parsing failed).
    #[error("invalid store spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// Network or I/O error.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// The content stream failed while being uploaded. Serialization
    /// failures on the producing side surface here.
    #[error("content stream for {name} failed: {source}")]
    Source {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic error from the underlying object store.
    #[error("object store error: {0}")]
    ObjectStore(object_store::Error),
}

impl StoreError {
    /// Returns true if the content stream, not the backend, failed.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::Source { .. })
    }

    /// Create from object_store error with context about the object.
    pub fn from_object_store(err: object_store::Error, name: &str) -> Self {
        match &err {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                name: name.to_string(),
            },
            _ => StoreError::ObjectStore(err),
        }
    }
}
