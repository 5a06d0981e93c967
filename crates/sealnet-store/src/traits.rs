//! AuthorityStore trait: the abstract interface for identity, seal, nonce and
//! transaction persistence.
//!
//! This trait allows the ledger to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use sealnet_core::{
    IdentityFingerprint, IdentityState, KeyType, SealFingerprint, StateTransition, Transaction,
    TransactionId,
};

use crate::error::{Result, StoreError};

/// A registered identity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub fingerprint: IdentityFingerprint,
    pub key_type: KeyType,
    /// PEM SubjectPublicKeyInfo.
    pub public_key_pem: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Authorization of one seal for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealRecord {
    pub identity: IdentityFingerprint,
    pub fingerprint: SealFingerprint,
    pub public_key_pem: String,
    pub version: u32,
    pub is_active: bool,
    pub created_at: i64,
    pub deactivated_at: Option<i64>,
}

/// Lifecycle of a stored transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "confirmed" => Ok(TransactionStatus::Confirmed),
            "rejected" => Ok(TransactionStatus::Rejected),
            other => Err(StoreError::InvalidData(format!("unknown status: {other}"))),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction as persisted, with its status.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransaction {
    pub transaction: Transaction,
    pub status: TransactionStatus,
    /// Unix milliseconds.
    pub created_at: i64,
    pub confirmed_at: Option<i64>,
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub identities: u64,
    pub active_seals: u64,
    pub pending_transactions: u64,
    pub confirmed_transactions: u64,
    pub rejected_transactions: u64,
}

/// Result of committing a [`StateTransition`].
///
/// Anything but `Committed` means nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The identity's nonce moved (or vanished) since validation.
    NonceConflict { current: Option<u64> },
    /// A debit found less than the amount at commit time.
    InsufficientFunds { balance: u64, amount: u64 },
    /// The signing seal was deactivated, or the incoming seal already exists.
    SealConflict,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed)
    }
}

/// Result of [`AuthorityStore::register`].
///
/// Anything but `Registered` means nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    /// An identity key is already recorded for the fingerprint.
    IdentityExists,
    /// The seal is already authorized, for this or another identity.
    SealInUse,
}

/// The AuthorityStore trait: synchronous interface to ledger persistence.
///
/// Methods block on I/O; async callers run them on a blocking thread.
///
/// # Design Notes
///
/// - **Atomic commits**: [`commit`](AuthorityStore::commit) applies every effect of a
///   transition together with the nonce increment, or nothing.
/// - **Nonce compare-and-swap**: a commit only succeeds if the identity's nonce still
///   equals the one the validator saw, which serializes same-identity submissions.
/// - **Seal exclusivity**: a seal fingerprint is active for at most one identity.
pub trait AuthorityStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Identity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Record an identity key and create its state.
    ///
    /// If a bare state already exists for the fingerprint (an identity that
    /// received a transfer before registering), its balance and nonce are kept
    /// and `initial_balance` is ignored.
    fn save_identity(&self, record: &IdentityRecord, initial_balance: u64) -> Result<()>;

    /// Record an identity key, its state and its first seal as one unit.
    ///
    /// Checks that neither the identity key nor the seal is already recorded,
    /// under the same lock or transaction that writes them. Balance handling
    /// follows [`save_identity`](AuthorityStore::save_identity).
    fn register(
        &self,
        record: &IdentityRecord,
        initial_balance: u64,
        seal: &SealFingerprint,
        seal_public_key_pem: &str,
        seal_version: u32,
    ) -> Result<RegistrationOutcome>;

    fn get_identity(&self, identity: &IdentityFingerprint) -> Result<Option<IdentityRecord>>;

    fn get_identity_state(&self, identity: &IdentityFingerprint) -> Result<Option<IdentityState>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Seal Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Authorize `seal` for `identity`.
    ///
    /// Returns `false` without writing if this seal is already recorded.
    fn authorize_seal(
        &self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
        public_key_pem: &str,
        version: u32,
    ) -> Result<bool>;

    /// Returns whether an active authorization was deactivated.
    fn deactivate_seal(&self, identity: &IdentityFingerprint, seal: &SealFingerprint)
        -> Result<bool>;

    fn get_seal(&self, seal: &SealFingerprint) -> Result<Option<SealRecord>>;

    /// PEM public key of `seal` if it is active for `identity`.
    fn get_authorized_seal_public_key(
        &self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
    ) -> Result<Option<String>>;

    fn get_active_seals(&self, identity: &IdentityFingerprint) -> Result<Vec<SealRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Nonce Operations
    // ─────────────────────────────────────────────────────────────────────────

    fn get_nonce(&self, identity: &IdentityFingerprint) -> Result<Option<u64>>;

    /// Unconditional increment; returns the new nonce.
    ///
    /// Transaction processing goes through [`commit`](AuthorityStore::commit) instead.
    fn increment_nonce(&self, identity: &IdentityFingerprint) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Transaction Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns `false` if a transaction with the same id is already stored.
    fn save_transaction(&self, tx: &Transaction, status: TransactionStatus) -> Result<bool>;

    fn get_transaction(&self, id: &TransactionId) -> Result<Option<StoredTransaction>>;

    /// Returns `false` if the transaction is unknown.
    fn set_transaction_status(&self, id: &TransactionId, status: TransactionStatus)
        -> Result<bool>;

    /// Most recent first.
    fn get_identity_transactions(
        &self,
        identity: &IdentityFingerprint,
        limit: usize,
    ) -> Result<Vec<StoredTransaction>>;

    /// Oldest first.
    fn get_pending_transactions(&self, limit: usize) -> Result<Vec<StoredTransaction>>;

    fn get_database_stats(&self) -> Result<DatabaseStats>;

    // ─────────────────────────────────────────────────────────────────────────
    // Commit
    // ─────────────────────────────────────────────────────────────────────────

    /// Atomically apply a validated transition.
    ///
    /// Checks the nonce, applies the effects in order, increments the nonce and
    /// records the transaction as pending, all in one unit of work.
    fn commit(&self, transition: &StateTransition) -> Result<CommitOutcome>;
}

/// Extension methods for AuthorityStore.
pub trait AuthorityStoreExt: AuthorityStore {
    /// Mark a stored transaction confirmed.
    fn confirm_transaction(&self, id: &TransactionId) -> Result<bool> {
        self.set_transaction_status(id, TransactionStatus::Confirmed)
    }

    /// Whether `seal` is currently active for `identity`.
    fn is_seal_authorized(
        &self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
    ) -> Result<bool> {
        Ok(self.get_authorized_seal_public_key(identity, seal)?.is_some())
    }
}

impl<T: AuthorityStore + ?Sized> AuthorityStoreExt for T {}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
