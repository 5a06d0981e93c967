//! Per-identity ledger state and the effects transactions have on it.
//!
//! The validator never mutates state. It produces a [`StateTransition`] (the
//! effects of one transaction plus the nonce it was checked against) and the
//! store applies the whole transition atomically or not at all.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::transaction::Transaction;
use crate::types::{IdentityFingerprint, SealFingerprint, TransactionId};

/// Ledger state of a single identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityState {
    pub identity_fingerprint: IdentityFingerprint,
    pub balance: u64,
    /// Invariant: a subset of `all_seals`.
    pub active_seals: BTreeSet<SealFingerprint>,
    pub all_seals: BTreeSet<SealFingerprint>,
    pub data_store: Map<String, Value>,
    /// Next expected nonce.
    pub nonce: u64,
}

impl IdentityState {
    /// Fresh state: no seals, empty data, nonce 0.
    pub fn new(identity_fingerprint: IdentityFingerprint, balance: u64) -> Self {
        Self {
            identity_fingerprint,
            balance,
            active_seals: BTreeSet::new(),
            all_seals: BTreeSet::new(),
            data_store: Map::new(),
            nonce: 0,
        }
    }

    /// Subtract `amount`, or return the current balance if it is too low.
    pub fn debit(&mut self, amount: u64) -> Result<(), u64> {
        match self.balance.checked_sub(amount) {
            Some(rest) => {
                self.balance = rest;
                Ok(())
            }
            None => Err(self.balance),
        }
    }

    /// Add `amount`; `None` on overflow.
    pub fn credit(&mut self, amount: u64) -> Option<()> {
        self.balance = self.balance.checked_add(amount)?;
        Some(())
    }

    /// Shallow merge, last write wins.
    pub fn merge_data(&mut self, entries: &Map<String, Value>) {
        for (k, v) in entries {
            self.data_store.insert(k.clone(), v.clone());
        }
    }

    pub fn add_seal(&mut self, seal: SealFingerprint) {
        self.all_seals.insert(seal.clone());
        self.active_seals.insert(seal);
    }

    /// Returns whether the seal was active.
    pub fn deactivate_seal(&mut self, seal: &SealFingerprint) -> bool {
        self.active_seals.remove(seal)
    }
}

/// One state change produced by a validated transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Debit {
        identity: IdentityFingerprint,
        amount: u64,
    },
    /// Creates the recipient with a zero balance if it does not exist yet.
    Credit {
        identity: IdentityFingerprint,
        amount: u64,
    },
    DeactivateSeal {
        identity: IdentityFingerprint,
        seal: SealFingerprint,
    },
    AuthorizeSeal {
        identity: IdentityFingerprint,
        seal: SealFingerprint,
        public_key_pem: String,
        version: u32,
    },
    MergeData {
        identity: IdentityFingerprint,
        entries: Map<String, Value>,
    },
}

/// The validated, not yet committed outcome of one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub transaction: Transaction,
    /// Nonce observed by the validator; the commit only succeeds if it is
    /// still current.
    pub expected_nonce: u64,
    pub effects: Vec<Effect>,
}

impl StateTransition {
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction.id()
    }

    pub fn identity(&self) -> &IdentityFingerprint {
        &self.transaction.identity_fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(balance: u64) -> IdentityState {
        IdentityState::new("pk:0000000000000001".parse().unwrap(), balance)
    }

    #[test]
    fn test_debit_credit() {
        let mut s = state(100);
        s.debit(40).unwrap();
        assert_eq!(s.balance, 60);
        assert_eq!(s.debit(61), Err(60));
        assert_eq!(s.balance, 60);
        s.credit(5).unwrap();
        assert_eq!(s.balance, 65);
        assert!(state(u64::MAX).credit(1).is_none());
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut s = state(0);
        s.merge_data(json!({"a": 1, "b": 2}).as_object().unwrap());
        s.merge_data(json!({"b": 3, "c": 4}).as_object().unwrap());
        assert_eq!(Value::Object(s.data_store), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_seal_sets() {
        let mut s = state(0);
        let a: SealFingerprint = "seal:000000000000000a".parse().unwrap();
        let b: SealFingerprint = "seal:000000000000000b".parse().unwrap();
        s.add_seal(a.clone());
        s.add_seal(b.clone());
        assert!(s.deactivate_seal(&a));
        assert!(!s.deactivate_seal(&a));
        assert!(s.active_seals.is_subset(&s.all_seals));
        assert_eq!(s.active_seals.len(), 1);
        assert_eq!(s.all_seals.len(), 2);
    }
}
