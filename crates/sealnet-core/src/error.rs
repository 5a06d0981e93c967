//! Error types for Sealnet core.

use thiserror::Error;

use crate::transaction::TransactionType;

/// Core errors that can occur while handling keys, seals, payloads and transactions.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("malformed key bytes: {0}")]
    MalformedKeyBytes(String),

    #[error("encryption failed")]
    EncryptionFailed,

    /// Deliberately carries no detail: a short blob and a failed tag look the same.
    #[error("decryption failed")]
    DecryptionError,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("encryption is only supported for data payloads, not {0}")]
    EncryptionNotSupportedForType(TransactionType),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Gate failures produced while validating a transaction against ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("seal is not authorized for this identity")]
    SealNotAuthorized,

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("nonce mismatch: expected {expected:?}, got {got}")]
    NonceMismatch { expected: Option<u64>, got: u64 },

    #[error("insufficient funds for amount {amount}")]
    InsufficientFunds { balance: u64, amount: u64 },

    #[error("transfer amount must be a positive integer")]
    InvalidAmount,

    #[error("malformed transfer: {0}")]
    MalformedTransfer(String),

    #[error("malformed seal rotation: {0}")]
    MalformedRotation(String),

    #[error("transaction type {0} has no validation rules")]
    UnsupportedTransactionType(TransactionType),
}

impl ValidationError {
    /// Short name of the gate that rejected the transaction, for logs.
    pub fn gate(&self) -> &'static str {
        match self {
            ValidationError::SealNotAuthorized => "seal",
            ValidationError::InvalidSignature => "signature",
            ValidationError::NonceMismatch { .. } => "nonce",
            ValidationError::InsufficientFunds { .. }
            | ValidationError::InvalidAmount
            | ValidationError::MalformedTransfer(_)
            | ValidationError::MalformedRotation(_)
            | ValidationError::UnsupportedTransactionType(_) => "effects",
        }
    }
}
