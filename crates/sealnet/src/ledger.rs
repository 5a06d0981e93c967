//! The Ledger: unified async API over validation, the mempool and storage.
//!
//! Store calls may block on I/O, so every unit of store work runs on tokio's
//! blocking pool. Validation itself is synchronous and never yields midway.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use sealnet_core::{
    IdentityFingerprint, IdentityPublicKey, IdentityState, KeyType, Seal, SealFingerprint,
    SealPublicKey, Transaction, TransactionId,
};
use sealnet_store::{
    now_millis, AuthorityStore, AuthorityStoreExt, DatabaseStats, IdentityRecord,
    RegistrationOutcome, SqliteStore, StoredTransaction, TransactionStatus,
};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::mempool::Mempool;
use crate::validator::Validator;

/// Version assigned to the seal an identity registers with.
pub const INITIAL_SEAL_VERSION: u32 = 1;

/// Upper bound on pending transactions reloaded into a fresh mempool.
const RESTORE_LIMIT: usize = u32::MAX as usize;

/// Request to register an identity together with its first seal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// PEM SubjectPublicKeyInfo of the identity key.
    pub identity_public_key: String,
    pub identity_key_type: KeyType,
    pub identity_fingerprint: IdentityFingerprint,
    /// PEM SubjectPublicKeyInfo of the initial seal.
    pub seal_public_key: String,
    pub seal_fingerprint: SealFingerprint,
    #[serde(default)]
    pub initial_balance: u64,
}

/// A transaction together with where it currently stands.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionView {
    pub transaction: Transaction,
    pub status: TransactionStatus,
}

/// Combined store and mempool counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub store: DatabaseStats,
    pub mempool_size: usize,
}

/// The main Ledger struct.
///
/// Provides a unified API for:
/// - Registering identities and their first seal
/// - Submitting transactions through the validation gates
/// - Querying identity state and transactions
/// - Confirming pending transactions
pub struct Ledger<S: AuthorityStore + 'static> {
    store: Arc<S>,
    validator: Arc<Validator<S>>,
    mempool: Arc<Mempool>,
    config: LedgerConfig,
}

impl Ledger<SqliteStore> {
    /// Open a ledger over a SQLite database file.
    pub fn open(path: impl AsRef<Path>, config: LedgerConfig) -> Result<Self> {
        let store = SqliteStore::open_with_config(path, &config.sqlite())?;
        Self::new(store, config)
    }
}

impl<S: AuthorityStore + 'static> Ledger<S> {
    /// Create a ledger over an existing store.
    ///
    /// Transactions the store still holds as pending are loaded back into the
    /// mempool, so a restart does not lose track of them.
    pub fn new(store: S, config: LedgerConfig) -> Result<Self> {
        let store = Arc::new(store);
        let mempool = Mempool::with_config(config.mempool.clone());
        let mut restored = 0usize;
        for stored in store.get_pending_transactions(RESTORE_LIMIT)? {
            if mempool.admit_committed(stored.transaction) {
                restored += 1;
            }
        }
        if restored > 0 {
            info!(restored, "pending transactions restored into mempool");
        }
        Ok(Self {
            validator: Arc::new(Validator::new(store.clone())),
            mempool: Arc::new(mempool),
            store,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Run `f` against the store on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| LedgerError::Task(e.to_string()))?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an identity and authorize its first seal.
    ///
    /// An identity that already received transfers before registering keeps
    /// its balance; `initial_balance` only applies to new state.
    pub async fn register_identity(
        &self,
        request: RegistrationRequest,
    ) -> Result<IdentityFingerprint> {
        let identity_key = IdentityPublicKey::new(
            request.identity_key_type,
            request.identity_public_key.clone().into_bytes(),
        );
        if identity_key.fingerprint != request.identity_fingerprint {
            return Err(LedgerError::RegistrationRejected(
                "identity fingerprint does not match its key".into(),
            ));
        }
        if !identity_key.verify_well_formed() {
            return Err(LedgerError::RegistrationRejected(format!(
                "identity key is not a valid {} public key",
                request.identity_key_type
            )));
        }

        let seal_key = SealPublicKey::from_pem(&request.seal_public_key).map_err(|_| {
            LedgerError::RegistrationRejected("seal key is not a PEM ed25519 key".into())
        })?;
        if seal_key.fingerprint() != request.seal_fingerprint {
            return Err(LedgerError::RegistrationRejected(
                "seal fingerprint does not match its key".into(),
            ));
        }

        let identity = request.identity_fingerprint.clone();
        let seal = request.seal_fingerprint.clone();
        let outcome = self
            .blocking(move |store| {
                let record = IdentityRecord {
                    fingerprint: request.identity_fingerprint,
                    key_type: request.identity_key_type,
                    public_key_pem: request.identity_public_key,
                    created_at: now_millis(),
                };
                Ok(store.register(
                    &record,
                    request.initial_balance,
                    &request.seal_fingerprint,
                    &request.seal_public_key,
                    INITIAL_SEAL_VERSION,
                )?)
            })
            .await?;

        match outcome {
            RegistrationOutcome::Registered => {}
            RegistrationOutcome::IdentityExists => {
                return Err(LedgerError::RegistrationRejected(format!(
                    "identity {identity} is already registered"
                )));
            }
            RegistrationOutcome::SealInUse => {
                return Err(LedgerError::RegistrationRejected(format!(
                    "seal {seal} is already in use"
                )));
            }
        }

        info!(%identity, "identity registered");
        Ok(identity)
    }

    pub async fn get_identity_state(
        &self,
        identity: &IdentityFingerprint,
    ) -> Result<Option<IdentityState>> {
        let identity = identity.clone();
        self.blocking(move |store| Ok(store.get_identity_state(&identity)?))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transaction Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate, commit and enqueue a transaction.
    ///
    /// On success the transaction's effects are applied, the identity's nonce
    /// has advanced, and the transaction is pending in the mempool. On any
    /// error nothing has changed. A resubmitted transaction fails the nonce
    /// gate, since its nonce has already been consumed.
    ///
    /// Commit and mempool admission happen together on the blocking pool, so
    /// dropping the returned future cannot separate them.
    pub async fn submit(&self, tx: Transaction) -> Result<TransactionId> {
        let id = tx.id();
        if !self.mempool.has_capacity() {
            let capacity = self.config.mempool.max_size.unwrap_or_default();
            warn!(capacity, "mempool full, refusing transaction");
            return Err(LedgerError::MempoolFull { capacity });
        }

        let validator = self.validator.clone();
        let mempool = self.mempool.clone();
        tokio::task::spawn_blocking(move || {
            validator.process(&tx)?;
            if !mempool.admit_committed(tx) {
                warn!(tx_id = %id, "committed transaction was already pending");
            }
            Ok::<_, LedgerError>(())
        })
        .await
        .map_err(|e| LedgerError::Task(e.to_string()))??;
        Ok(id)
    }

    /// Look a transaction up, mempool first, then the store.
    pub async fn get_transaction(&self, id: &TransactionId) -> Result<Option<TransactionView>> {
        if let Some(transaction) = self.mempool.get(id) {
            return Ok(Some(TransactionView {
                transaction,
                status: TransactionStatus::Pending,
            }));
        }
        let id = *id;
        let stored = self
            .blocking(move |store| Ok(store.get_transaction(&id)?))
            .await?;
        Ok(stored.map(|s| TransactionView {
            transaction: s.transaction,
            status: s.status,
        }))
    }

    /// Mark a transaction confirmed and drop it from the mempool.
    pub async fn confirm(&self, id: &TransactionId) -> Result<()> {
        let tx_id = *id;
        let found = self
            .blocking(move |store| Ok(store.confirm_transaction(&tx_id)?))
            .await?;
        if !found {
            return Err(LedgerError::TransactionNotFound(*id));
        }
        self.mempool.remove(id);
        info!(tx_id = %id, "transaction confirmed");
        Ok(())
    }

    /// Pending transactions, oldest first, capped by the configured limit.
    pub fn pending(&self, limit: usize) -> Vec<Transaction> {
        self.mempool
            .get_pending(limit.min(self.config.pending_limit))
    }

    /// Stored transactions of one identity, most recent first.
    pub async fn identity_transactions(
        &self,
        identity: &IdentityFingerprint,
        limit: usize,
    ) -> Result<Vec<StoredTransaction>> {
        let identity = identity.clone();
        self.blocking(move |store| Ok(store.get_identity_transactions(&identity, limit)?))
            .await
    }

    pub async fn stats(&self) -> Result<LedgerStats> {
        let store = self
            .blocking(|store| Ok(store.get_database_stats()?))
            .await?;
        Ok(LedgerStats {
            store,
            mempool_size: self.mempool.size(),
        })
    }

    /// Decrypt an encrypted data payload with the seal that signed it.
    pub fn decrypt_payload(&self, tx: &Transaction, seal: &Seal) -> Result<Map<String, Value>> {
        Ok(tx.decrypt_payload(seal)?)
    }
}
