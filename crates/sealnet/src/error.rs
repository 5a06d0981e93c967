//! Error types for the ledger.

use sealnet_core::{CoreError, TransactionId, ValidationError};
use sealnet_store::StoreError;
use thiserror::Error;

use crate::mempool::MempoolError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A validation gate rejected the transaction. Nothing was written.
    #[error("transaction rejected: {0}")]
    Rejected(#[from] ValidationError),

    /// The transaction is already pending.
    #[error("duplicate transaction: {0}")]
    DuplicateTransaction(TransactionId),

    /// The mempool is at capacity.
    #[error("mempool full (capacity {capacity})")]
    MempoolFull { capacity: usize },

    /// The store could not be reached; the request may be retried.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Non-retryable storage error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// Registration request failed a consistency check.
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),

    /// Key, payload or encoding error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Transaction not found.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl LedgerError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StoreUnavailable(_))
    }

    /// The validation failure, if this is a gate rejection.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            LedgerError::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        if e.is_retryable() {
            LedgerError::StoreUnavailable(e.to_string())
        } else {
            LedgerError::Store(e)
        }
    }
}

impl From<MempoolError> for LedgerError {
    fn from(e: MempoolError) -> Self {
        match e {
            MempoolError::Duplicate(id) => LedgerError::DuplicateTransaction(id),
            MempoolError::Full { capacity } => LedgerError::MempoolFull { capacity },
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_is_retryable() {
        let e: LedgerError = StoreError::Unavailable("pool".into()).into();
        assert!(e.is_retryable());
        let e: LedgerError = StoreError::NotFound("x".into()).into();
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_rejection_exposes_gate() {
        let e: LedgerError = ValidationError::SealNotAuthorized.into();
        assert_eq!(e.validation().map(|v| v.gate()), Some("seal"));
    }
}
