//! # Sealnet Store
//!
//! Storage abstraction for Sealnet. Provides a trait-based interface for
//! identity, seal, nonce and transaction persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The store module abstracts ledger state behind the [`AuthorityStore`] trait,
//! allowing the validator to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`AuthorityStore`] - The trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage over a [`ConnectionPool`]
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`CommitOutcome`] - Result of atomically applying a validated transition
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealnet_store::{AuthorityStore, SqliteStore};
//!
//! // Open a SQLite database
//! let store = SqliteStore::open("sealnet.db").unwrap();
//!
//! // Or use an in-memory database for testing
//! let store = SqliteStore::open_memory().unwrap();
//! let stats = store.get_database_stats().unwrap();
//! assert_eq!(stats.identities, 0);
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic commits**: a transition's effects, nonce increment and transaction
//!   record are written together or not at all
//! - **Nonce compare-and-swap**: concurrent commits for one identity cannot both succeed
//! - **Seal exclusivity**: a seal fingerprint is recorded for exactly one identity

pub mod error;
pub mod memory;
pub mod migration;
pub mod pool;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use pool::{ConnectionPool, PooledConnection};
pub use sqlite::{SqliteConfig, SqliteStore};
pub use traits::{
    now_millis, AuthorityStore, AuthorityStoreExt, CommitOutcome, DatabaseStats, IdentityRecord,
    RegistrationOutcome, SealRecord, StoredTransaction, TransactionStatus,
};
