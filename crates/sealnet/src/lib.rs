//! # Sealnet
//!
//! Seal-authorized transaction ledger: identities delegate signing to
//! rotatable seals, and every transaction passes ordered validation gates
//! before its effects are committed atomically.
//!
//! ## Overview
//!
//! - **Identities**: long-lived ed25519 or RSA keys, addressed by fingerprint
//! - **Seals**: ed25519 keys authorized to sign for one identity, rotated in-band
//! - **Validation**: seal, signature, nonce, then type-specific effects
//! - **Mempool**: validated transactions awaiting confirmation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealnet::{Ledger, LedgerConfig, RegistrationRequest};
//! use sealnet::core::{IdentityKeyPair, KeyType, Seal, TransactionBuilder, TransactionType};
//! use sealnet::store::MemoryStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = Ledger::new(MemoryStore::new(), LedgerConfig::default())?;
//!
//!     let keys = IdentityKeyPair::generate(KeyType::Ed25519)?;
//!     let seal = Seal::generate();
//!     ledger
//!         .register_identity(RegistrationRequest {
//!             identity_public_key: String::from_utf8(keys.public_key().key_bytes.clone())?,
//!             identity_key_type: keys.key_type(),
//!             identity_fingerprint: keys.fingerprint().clone(),
//!             seal_public_key: seal.public_key_pem()?,
//!             seal_fingerprint: seal.fingerprint(),
//!             initial_balance: 0,
//!         })
//!         .await?;
//!
//!     let tx = TransactionBuilder::new(keys.fingerprint().clone(), TransactionType::Data, 0)
//!         .sign(&seal)?;
//!     let id = ledger.submit(tx).await?;
//!     ledger.confirm(&id).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `sealnet::core` - Keys, seals, transactions, canonical encoding
//! - `sealnet::store` - Storage abstraction, SQLite and in-memory stores

pub mod config;
pub mod error;
pub mod ledger;
pub mod mempool;
pub mod telemetry;
pub mod validator;

// Re-export component crates
pub use sealnet_core as core;
pub use sealnet_store as store;

pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, LedgerStats, RegistrationRequest, TransactionView, INITIAL_SEAL_VERSION};
pub use mempool::{Mempool, MempoolConfig, MempoolError};
pub use telemetry::{init_tracing, LogFormat};
pub use validator::Validator;

// Re-export commonly used core types
pub use sealnet_core::{
    IdentityFingerprint, IdentityKeyPair, IdentityState, KeyType, Seal, SealFingerprint,
    Transaction, TransactionBuilder, TransactionId, TransactionType, ValidationError,
};
