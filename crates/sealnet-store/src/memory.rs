//! In-memory implementation of the AuthorityStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

use sealnet_core::{
    Effect, IdentityFingerprint, IdentityState, SealFingerprint, StateTransition, Transaction,
    TransactionId,
};

use crate::error::{Result, StoreError};
use crate::traits::{
    now_millis, AuthorityStore, CommitOutcome, DatabaseStats, IdentityRecord,
    RegistrationOutcome, SealRecord, StoredTransaction, TransactionStatus,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; a
/// commit holds the write lock for its whole duration and copies only the
/// entries its effects touch.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    identities: HashMap<IdentityFingerprint, IdentityRecord>,

    /// Balance, data and nonce. Seal sets are derived from `seals` on read.
    states: HashMap<IdentityFingerprint, IdentityState>,

    /// Seal authorizations indexed by seal fingerprint.
    seals: HashMap<SealFingerprint, SealRecord>,

    transactions: HashMap<TransactionId, StoredEntry>,

    /// Monotonic insertion counter for stable listing order.
    next_seq: u64,
}

struct StoredEntry {
    seq: u64,
    stored: StoredTransaction,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn save_identity(&mut self, record: &IdentityRecord, initial_balance: u64) {
        self.identities
            .insert(record.fingerprint.clone(), record.clone());
        self.states
            .entry(record.fingerprint.clone())
            .or_insert_with(|| IdentityState::new(record.fingerprint.clone(), initial_balance));
    }

    /// Returns `false` without writing if the seal is already recorded.
    fn insert_seal(
        &mut self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
        public_key_pem: &str,
        version: u32,
    ) -> bool {
        if self.seals.contains_key(seal) {
            return false;
        }
        self.seals.insert(
            seal.clone(),
            SealRecord {
                identity: identity.clone(),
                fingerprint: seal.clone(),
                public_key_pem: public_key_pem.to_string(),
                version,
                is_active: true,
                created_at: now_millis(),
                deactivated_at: None,
            },
        );
        true
    }

    /// Copy out the states and seals `transition` reads or writes.
    fn stage(&self, transition: &StateTransition) -> Staged {
        let mut staged = Staged::default();
        let mut stage_state = |identity: &IdentityFingerprint| {
            if let Some(state) = self.states.get(identity) {
                staged
                    .states
                    .entry(identity.clone())
                    .or_insert_with(|| state.clone());
            }
        };
        stage_state(transition.identity());
        for effect in &transition.effects {
            match effect {
                Effect::Debit { identity, .. }
                | Effect::Credit { identity, .. }
                | Effect::MergeData { identity, .. } => stage_state(identity),
                Effect::DeactivateSeal { .. } | Effect::AuthorizeSeal { .. } => {}
            }
        }
        for effect in &transition.effects {
            if let Effect::DeactivateSeal { seal, .. } | Effect::AuthorizeSeal { seal, .. } = effect
            {
                if let Some(record) = self.seals.get(seal) {
                    staged.seals.insert(seal.clone(), record.clone());
                }
            }
        }
        staged
    }

    fn insert_transaction(&mut self, tx: &Transaction, status: TransactionStatus) -> bool {
        let id = tx.id();
        if self.transactions.contains_key(&id) {
            return false;
        }
        let now = now_millis();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.transactions.insert(
            id,
            StoredEntry {
                seq,
                stored: StoredTransaction {
                    transaction: tx.clone(),
                    status,
                    created_at: now,
                    confirmed_at: (status == TransactionStatus::Confirmed).then_some(now),
                },
            },
        );
        true
    }

    fn sorted_transactions<'a>(
        &'a self,
        filter: impl Fn(&StoredTransaction) -> bool,
    ) -> Vec<&'a StoredEntry> {
        let mut entries: Vec<&StoredEntry> = self
            .transactions
            .values()
            .filter(|e| filter(&e.stored))
            .collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }
}

/// Copies of the entries one commit touches.
#[derive(Default)]
struct Staged {
    states: HashMap<IdentityFingerprint, IdentityState>,
    seals: HashMap<SealFingerprint, SealRecord>,
}

/// Apply effects to staged copies of the affected states and seals.
///
/// Returns the outcome to report if an effect cannot be applied.
fn apply_effects(
    effects: &[Effect],
    states: &mut HashMap<IdentityFingerprint, IdentityState>,
    seals: &mut HashMap<SealFingerprint, SealRecord>,
) -> Result<Option<CommitOutcome>> {
    let now = now_millis();
    for effect in effects {
        match effect {
            Effect::Debit { identity, amount } => {
                let state = states
                    .get_mut(identity)
                    .ok_or_else(|| StoreError::NotFound(identity.to_string()))?;
                if let Err(balance) = state.debit(*amount) {
                    return Ok(Some(CommitOutcome::InsufficientFunds {
                        balance,
                        amount: *amount,
                    }));
                }
            }
            Effect::Credit { identity, amount } => {
                let state = states
                    .entry(identity.clone())
                    .or_insert_with(|| IdentityState::new(identity.clone(), 0));
                state
                    .credit(*amount)
                    .ok_or_else(|| StoreError::InvalidData("balance overflow".into()))?;
            }
            Effect::DeactivateSeal { identity, seal } => match seals.get_mut(seal) {
                Some(record) if record.identity == *identity && record.is_active => {
                    record.is_active = false;
                    record.deactivated_at = Some(now);
                }
                _ => return Ok(Some(CommitOutcome::SealConflict)),
            },
            Effect::AuthorizeSeal {
                identity,
                seal,
                public_key_pem,
                version,
            } => {
                if seals.contains_key(seal) {
                    return Ok(Some(CommitOutcome::SealConflict));
                }
                seals.insert(
                    seal.clone(),
                    SealRecord {
                        identity: identity.clone(),
                        fingerprint: seal.clone(),
                        public_key_pem: public_key_pem.clone(),
                        version: *version,
                        is_active: true,
                        created_at: now,
                        deactivated_at: None,
                    },
                );
            }
            Effect::MergeData { identity, entries } => {
                let state = states
                    .get_mut(identity)
                    .ok_or_else(|| StoreError::NotFound(identity.to_string()))?;
                state.merge_data(entries);
            }
        }
    }
    Ok(None)
}

impl AuthorityStore for MemoryStore {
    fn save_identity(&self, record: &IdentityRecord, initial_balance: u64) -> Result<()> {
        self.inner.write().save_identity(record, initial_balance);
        Ok(())
    }

    fn register(
        &self,
        record: &IdentityRecord,
        initial_balance: u64,
        seal: &SealFingerprint,
        seal_public_key_pem: &str,
        seal_version: u32,
    ) -> Result<RegistrationOutcome> {
        let mut inner = self.inner.write();
        if inner.identities.contains_key(&record.fingerprint) {
            return Ok(RegistrationOutcome::IdentityExists);
        }
        if inner.seals.contains_key(seal) {
            return Ok(RegistrationOutcome::SealInUse);
        }
        inner.save_identity(record, initial_balance);
        inner.insert_seal(&record.fingerprint, seal, seal_public_key_pem, seal_version);
        Ok(RegistrationOutcome::Registered)
    }

    fn get_identity(&self, identity: &IdentityFingerprint) -> Result<Option<IdentityRecord>> {
        Ok(self.inner.read().identities.get(identity).cloned())
    }

    fn get_identity_state(&self, identity: &IdentityFingerprint) -> Result<Option<IdentityState>> {
        let inner = self.inner.read();
        let Some(state) = inner.states.get(identity) else {
            return Ok(None);
        };
        let mut state = state.clone();
        let owned = inner.seals.values().filter(|s| s.identity == *identity);
        state.all_seals = owned.clone().map(|s| s.fingerprint.clone()).collect();
        state.active_seals = owned
            .filter(|s| s.is_active)
            .map(|s| s.fingerprint.clone())
            .collect::<BTreeSet<_>>();
        Ok(Some(state))
    }

    fn authorize_seal(
        &self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
        public_key_pem: &str,
        version: u32,
    ) -> Result<bool> {
        Ok(self
            .inner
            .write()
            .insert_seal(identity, seal, public_key_pem, version))
    }

    fn deactivate_seal(
        &self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
    ) -> Result<bool> {
        let mut inner = self.inner.write();
        match inner.seals.get_mut(seal) {
            Some(record) if record.identity == *identity && record.is_active => {
                record.is_active = false;
                record.deactivated_at = Some(now_millis());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn get_seal(&self, seal: &SealFingerprint) -> Result<Option<SealRecord>> {
        Ok(self.inner.read().seals.get(seal).cloned())
    }

    fn get_authorized_seal_public_key(
        &self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
    ) -> Result<Option<String>> {
        Ok(self
            .inner
            .read()
            .seals
            .get(seal)
            .filter(|s| s.identity == *identity && s.is_active)
            .map(|s| s.public_key_pem.clone()))
    }

    fn get_active_seals(&self, identity: &IdentityFingerprint) -> Result<Vec<SealRecord>> {
        let inner = self.inner.read();
        let mut seals: Vec<SealRecord> = inner
            .seals
            .values()
            .filter(|s| s.identity == *identity && s.is_active)
            .cloned()
            .collect();
        seals.sort_by_key(|s| s.version);
        Ok(seals)
    }

    fn get_nonce(&self, identity: &IdentityFingerprint) -> Result<Option<u64>> {
        Ok(self.inner.read().states.get(identity).map(|s| s.nonce))
    }

    fn increment_nonce(&self, identity: &IdentityFingerprint) -> Result<u64> {
        let mut inner = self.inner.write();
        let state = inner
            .states
            .get_mut(identity)
            .ok_or_else(|| StoreError::NotFound(identity.to_string()))?;
        state.nonce += 1;
        Ok(state.nonce)
    }

    fn save_transaction(&self, tx: &Transaction, status: TransactionStatus) -> Result<bool> {
        Ok(self.inner.write().insert_transaction(tx, status))
    }

    fn get_transaction(&self, id: &TransactionId) -> Result<Option<StoredTransaction>> {
        Ok(self
            .inner
            .read()
            .transactions
            .get(id)
            .map(|e| e.stored.clone()))
    }

    fn set_transaction_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
    ) -> Result<bool> {
        let mut inner = self.inner.write();
        let Some(entry) = inner.transactions.get_mut(id) else {
            return Ok(false);
        };
        entry.stored.status = status;
        entry.stored.confirmed_at = match status {
            TransactionStatus::Confirmed => Some(now_millis()),
            _ => None,
        };
        Ok(true)
    }

    fn get_identity_transactions(
        &self,
        identity: &IdentityFingerprint,
        limit: usize,
    ) -> Result<Vec<StoredTransaction>> {
        let inner = self.inner.read();
        Ok(inner
            .sorted_transactions(|s| s.transaction.identity_fingerprint == *identity)
            .into_iter()
            .rev()
            .take(limit)
            .map(|e| e.stored.clone())
            .collect())
    }

    fn get_pending_transactions(&self, limit: usize) -> Result<Vec<StoredTransaction>> {
        let inner = self.inner.read();
        Ok(inner
            .sorted_transactions(|s| s.status == TransactionStatus::Pending)
            .into_iter()
            .take(limit)
            .map(|e| e.stored.clone())
            .collect())
    }

    fn get_database_stats(&self) -> Result<DatabaseStats> {
        let inner = self.inner.read();
        let mut stats = DatabaseStats {
            identities: inner.identities.len() as u64,
            active_seals: inner.seals.values().filter(|s| s.is_active).count() as u64,
            ..DatabaseStats::default()
        };
        for entry in inner.transactions.values() {
            match entry.stored.status {
                TransactionStatus::Pending => stats.pending_transactions += 1,
                TransactionStatus::Confirmed => stats.confirmed_transactions += 1,
                TransactionStatus::Rejected => stats.rejected_transactions += 1,
            }
        }
        Ok(stats)
    }

    fn commit(&self, transition: &StateTransition) -> Result<CommitOutcome> {
        let mut inner = self.inner.write();
        let identity = transition.identity();

        let current = inner.states.get(identity).map(|s| s.nonce);
        if current != Some(transition.expected_nonce) {
            return Ok(CommitOutcome::NonceConflict { current });
        }

        let Staged {
            mut states,
            mut seals,
        } = inner.stage(transition);
        if let Some(outcome) = apply_effects(&transition.effects, &mut states, &mut seals)? {
            return Ok(outcome);
        }

        if let Some(state) = states.get_mut(identity) {
            state.nonce += 1;
        }
        inner.states.extend(states);
        inner.seals.extend(seals);
        inner.insert_transaction(&transition.transaction, TransactionStatus::Pending);

        Ok(CommitOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealnet_core::{KeyType, Seal, TransactionBuilder, TransactionType};

    fn identity(n: u8) -> IdentityFingerprint {
        format!("pk:{:016x}", n).parse().unwrap()
    }

    fn registered(store: &MemoryStore, who: &IdentityFingerprint, seal: &Seal, balance: u64) {
        let record = IdentityRecord {
            fingerprint: who.clone(),
            key_type: KeyType::Ed25519,
            public_key_pem: String::new(),
            created_at: 0,
        };
        let outcome = store
            .register(&record, balance, &seal.fingerprint(), "pem", 1)
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Registered);
    }

    #[test]
    fn test_commit_stages_only_touched_entries() {
        let store = MemoryStore::new();
        let (alice, bob, carol) = (identity(1), identity(2), identity(3));
        let seal = Seal::from_seed(&[1; 32]).unwrap();
        registered(&store, &alice, &seal, 100);
        registered(&store, &carol, &Seal::from_seed(&[3; 32]).unwrap(), 7);

        let tx = TransactionBuilder::new(alice.clone(), TransactionType::TokenTransfer, 0)
            .sign(&seal)
            .unwrap();
        let transition = StateTransition {
            transaction: tx,
            expected_nonce: 0,
            effects: vec![
                Effect::Debit { identity: alice.clone(), amount: 40 },
                Effect::Credit { identity: bob.clone(), amount: 40 },
            ],
        };

        let staged = store.inner.read().stage(&transition);
        // Bob does not exist yet; Carol and every seal are left alone.
        assert_eq!(staged.states.keys().collect::<Vec<_>>(), vec![&alice]);
        assert!(staged.seals.is_empty());

        assert!(store.commit(&transition).unwrap().is_committed());
        assert_eq!(store.get_identity_state(&alice).unwrap().unwrap().balance, 60);
        assert_eq!(store.get_identity_state(&bob).unwrap().unwrap().balance, 40);
        let untouched = store.get_identity_state(&carol).unwrap().unwrap();
        assert_eq!((untouched.balance, untouched.nonce), (7, 0));
        assert_eq!(untouched.active_seals.len(), 1);
    }

    #[test]
    fn test_rotation_stages_both_seals() {
        let store = MemoryStore::new();
        let alice = identity(1);
        let old = Seal::from_seed(&[1; 32]).unwrap();
        let new = Seal::from_seed(&[2; 32]).unwrap();
        registered(&store, &alice, &old, 0);

        let tx = TransactionBuilder::new(alice.clone(), TransactionType::SealRotation, 0)
            .sign(&old)
            .unwrap();
        let transition = StateTransition {
            transaction: tx,
            expected_nonce: 0,
            effects: vec![
                Effect::DeactivateSeal { identity: alice.clone(), seal: old.fingerprint() },
                Effect::AuthorizeSeal {
                    identity: alice.clone(),
                    seal: new.fingerprint(),
                    public_key_pem: "pem".into(),
                    version: 2,
                },
            ],
        };

        // Only the existing seal can be copied; the new one is written on apply.
        let staged = store.inner.read().stage(&transition);
        assert_eq!(staged.seals.len(), 1);
        assert!(staged.seals.contains_key(&old.fingerprint()));

        assert!(store.commit(&transition).unwrap().is_committed());
        assert!(!store.get_seal(&old.fingerprint()).unwrap().unwrap().is_active);
        assert_eq!(store.get_seal(&new.fingerprint()).unwrap().unwrap().version, 2);
    }
}
