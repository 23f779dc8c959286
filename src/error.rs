//! Error types for the store adapters and the inventory service.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Failures raised by an [`InventoryStore`](crate::store::InventoryStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or dropped the connection mid-command.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored field is missing or does not parse to its expected type.
    #[error("malformed record {key}: {reason}")]
    Malformed { key: String, reason: String },
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        match e.kind() {
            redis::ErrorKind::TypeError => StoreError::malformed("<reply>", e.to_string()),
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

/// Outcomes of an inventory operation other than success.
///
/// Every variant is turned into a sentinel record or a status string before
/// it reaches the wire.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("invalid product identifier {0}")]
    InvalidInput(i64),

    #[error("product {0} not found")]
    NotFound(i64),

    #[error("product {0} already exists")]
    AlreadyExists(i64),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("malformed stored record {key}: {reason}")]
    MalformedStoredRecord { key: String, reason: String },
}

impl From<StoreError> for InventoryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => InventoryError::StoreUnavailable(msg),
            StoreError::Malformed { key, reason } => {
                InventoryError::MalformedStoredRecord { key, reason }
            }
        }
    }
}
