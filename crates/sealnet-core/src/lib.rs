//! # Sealnet Core
//!
//! Pure primitives for Sealnet: identity keys, seals, payload encryption and
//! canonical transactions.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`IdentityKeyPair`] - The long-lived ed25519 or RSA identity key
//! - [`Seal`] - A rotatable ed25519 key that signs on behalf of an identity
//! - [`Transaction`] - A signed, nonce-ordered record of an identity action
//! - [`TransactionId`] - Content address (SHA-256 of the canonical bytes)
//! - [`IdentityState`] - Balance, seals, data and nonce of one identity
//!
//! ## Canonicalization
//!
//! Transactions are signed over sorted-key JSON. See [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod seal;
pub mod signer;
pub mod state;
pub mod transaction;
pub mod types;

pub use canonical::{canonical_bytes, canonical_json, signed_message};
pub use crypto::{SealPublicKey, SealSignature, Sha256Hash};
pub use encryption::{decrypt, derive_key, encrypt, PayloadKey};
pub use error::{CoreError, ValidationError};
pub use keys::{fingerprint, IdentityKeyPair, IdentityPublicKey, KeyType};
pub use seal::Seal;
pub use signer::{create_seal_rotation, create_signed_transaction, seal_rotation_data, sign};
pub use state::{Effect, IdentityState, StateTransition};
pub use transaction::{
    now_secs, PayloadBody, Transaction, TransactionBuilder, TransactionPayload, TransactionType,
    UnsignedTransaction, PROTOCOL_VERSION,
};
pub use types::{IdentityFingerprint, SealFingerprint, TransactionId};
