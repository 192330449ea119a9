//! Error types for the storage layer.

use hcm_core::HcmError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{table} not found: {id}")]
    NotFound {
        /// The table searched.
        table: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// A natural unique key already exists.
    #[error("{table} conflict on key {key}")]
    Conflict {
        /// The table written.
        table: &'static str,
        /// The duplicated key.
        key: String,
    },

    /// The filter or page window is not acceptable for the table.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<StoreError> for HcmError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidFilter(msg) => Self::InvalidParameter(msg),
            other => Self::StorageFailure(other.to_string()),
        }
    }
}

impl From<HcmError> for StoreError {
    fn from(err: HcmError) -> Self {
        Self::InvalidFilter(err.to_string())
    }
}
