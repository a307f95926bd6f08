use thiserror::Error;

use crate::path::DocPath;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// The referenced document does not exist.
    #[error("Document not found: {0}")]
    NotFound(DocPath),

    /// A conditional numeric update was refused because it would have
    /// pushed the field below its floor.
    #[error(
        "Precondition failed on {path} field '{field}': current {current}, delta {delta}, floor {floor}"
    )]
    PreconditionFailed {
        path: DocPath,
        field: String,
        current: i64,
        delta: i64,
        floor: i64,
    },

    /// A path string did not parse as a document or collection path.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A field held a value of the wrong type for the requested operation.
    #[error("Field '{field}' on {path} is not of type {expected}")]
    FieldType {
        path: DocPath,
        field: String,
        expected: &'static str,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocStoreError>;
