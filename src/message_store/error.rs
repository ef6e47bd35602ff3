//! Store errors

use thiserror::Error;

/// Result type for message store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in message store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed game id or inverted range. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend I/O failure, timeout or contention. Safe to retry for reads.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The `(game, seq)` key was taken by a concurrent append.
    ///
    /// Only produced by `MessageTable::put_if_absent`; `MessageStore::append`
    /// consumes it.
    #[error("Sequence conflict: game={game}, seq={seq}")]
    SequenceConflict { game: String, seq: u64 },
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::StorageUnavailable(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::StorageUnavailable(format!("IO error: {}", e))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::StorageUnavailable(format!("JSON error: {}", e))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::StorageUnavailable(format!("storage task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_unavailable_is_retryable() {
        assert!(StoreError::StorageUnavailable("down".to_string()).is_retryable());
        assert!(!StoreError::InvalidInput("bad".to_string()).is_retryable());
        assert!(!StoreError::SequenceConflict {
            game: "chess".to_string(),
            seq: 1
        }
        .is_retryable());
    }

    #[test]
    fn test_io_error_maps_to_storage_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::StorageUnavailable(ref m) if m.contains("disk gone")));
    }
}
