//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use rand::RngCore;
use serde_json::{Map, Value};

use sealnet::{Ledger, LedgerConfig, RegistrationRequest, Result};
use sealnet_core::{
    create_seal_rotation, IdentityFingerprint, IdentityKeyPair, Seal, Transaction,
    TransactionBuilder, TransactionType,
};
use sealnet_store::{AuthorityStore, MemoryStore};

/// An identity with one active seal and a local nonce counter.
pub struct TestFixture {
    pub keys: IdentityKeyPair,
    pub seal: Seal,
    next_nonce: u64,
}

impl TestFixture {
    /// Create a new test fixture with random keys.
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::with_seed(seed)
    }

    /// Create with deterministic keys from a seed.
    ///
    /// The seal seed is the bitwise complement of `seed`, so identity and
    /// seal keys never coincide.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let seal_seed = seed.map(|b| !b);
        Self {
            keys: identity_from_seed(&seed),
            seal: seal_from_seed(&seal_seed),
            next_nonce: 0,
        }
    }

    pub fn fingerprint(&self) -> &IdentityFingerprint {
        self.keys.fingerprint()
    }

    /// Nonce the next built transaction will carry.
    pub fn nonce(&self) -> u64 {
        self.next_nonce
    }

    /// Registration request for this identity and its current seal.
    pub fn registration(&self, initial_balance: u64) -> RegistrationRequest {
        RegistrationRequest {
            identity_public_key: String::from_utf8_lossy(&self.keys.public_key().key_bytes)
                .into_owned(),
            identity_key_type: self.keys.key_type(),
            identity_fingerprint: self.fingerprint().clone(),
            seal_public_key: self.seal.public_key_pem().unwrap_or_default(),
            seal_fingerprint: self.seal.fingerprint(),
            initial_balance,
        }
    }

    /// Create a signed data transaction at the next nonce.
    pub fn make_data(&mut self, data: Map<String, Value>) -> Transaction {
        let nonce = self.take_nonce();
        self.build(TransactionType::Data, nonce, data, false)
    }

    /// Create an encrypted data transaction at the next nonce.
    pub fn make_encrypted(&mut self, data: Map<String, Value>) -> Transaction {
        let nonce = self.take_nonce();
        self.build(TransactionType::Data, nonce, data, true)
    }

    /// Create a token transfer at the next nonce.
    pub fn make_transfer(&mut self, recipient: &IdentityFingerprint, amount: u64) -> Transaction {
        let mut data = Map::new();
        data.insert("recipient".into(), Value::String(recipient.to_string()));
        data.insert("amount".into(), Value::from(amount));
        let nonce = self.take_nonce();
        self.build(TransactionType::TokenTransfer, nonce, data, false)
    }

    /// Create a rotation to `next` at the next nonce and switch to it.
    pub fn make_rotation(&mut self, next: Seal) -> Transaction {
        let nonce = self.take_nonce();
        let tx = create_seal_rotation(self.fingerprint(), &self.seal, &next, nonce)
            .unwrap_or_else(|e| panic!("rotation failed: {e}"));
        self.seal = next;
        tx
    }

    /// Register this identity with `ledger`.
    pub async fn register<S: AuthorityStore + 'static>(
        &self,
        ledger: &Ledger<S>,
        initial_balance: u64,
    ) -> Result<()> {
        ledger
            .register_identity(self.registration(initial_balance))
            .await
            .map(|_| ())
    }

    fn take_nonce(&mut self) -> u64 {
        let nonce = self.next_nonce;
        self.next_nonce += 1;
        nonce
    }

    fn build(
        &self,
        tx_type: TransactionType,
        nonce: u64,
        data: Map<String, Value>,
        encrypted: bool,
    ) -> Transaction {
        TransactionBuilder::new(self.fingerprint().clone(), tx_type, nonce)
            .data(data)
            .encrypted(encrypted)
            .sign(&self.seal)
            .unwrap_or_else(|e| panic!("signing failed: {e}"))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory ledger with default configuration.
pub fn memory_ledger() -> Ledger<MemoryStore> {
    Ledger::new(MemoryStore::new(), LedgerConfig::default())
        .unwrap_or_else(|e| panic!("memory ledger: {e}"))
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}

fn identity_from_seed(seed: &[u8; 32]) -> IdentityKeyPair {
    IdentityKeyPair::ed25519_from_seed(seed).unwrap_or_else(|e| panic!("identity key: {e}"))
}

fn seal_from_seed(seed: &[u8; 32]) -> Seal {
    Seal::from_seed(seed).unwrap_or_else(|e| panic!("seal key: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fixture_nonces_advance() {
        let mut fixture = TestFixture::with_seed([7; 32]);
        let a = fixture.make_data(Map::new());
        let b = fixture.make_data(Map::new());
        assert_eq!((a.nonce, b.nonce), (0, 1));
        assert_eq!(fixture.nonce(), 2);
    }

    #[test]
    fn test_multi_party() {
        let parties = multi_party_fixtures(3);

        // Each party has unique keys
        let fps: Vec<_> = parties.iter().map(|p| p.fingerprint().clone()).collect();
        assert_ne!(fps[0], fps[1]);
        assert_ne!(fps[1], fps[2]);
        assert_ne!(fps[0], fps[2]);
    }

    #[tokio::test]
    async fn test_fixture_with_sqlite_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("fixture.db"), LedgerConfig::default()).unwrap();
        let mut fixture = TestFixture::with_seed([4; 32]);
        fixture.register(&ledger, 0).await.unwrap();
        ledger.submit(fixture.make_data(Map::new())).await.unwrap();
        assert_eq!(ledger.stats().await.unwrap().store.pending_transactions, 1);
    }

    #[tokio::test]
    async fn test_fixture_drives_ledger() {
        let ledger = memory_ledger();
        let mut alice = TestFixture::with_seed([1; 32]);
        let bob = TestFixture::with_seed([2; 32]);
        alice.register(&ledger, 100).await.unwrap();
        bob.register(&ledger, 0).await.unwrap();

        ledger
            .submit(alice.make_data(json!({"a": 1}).as_object().cloned().unwrap()))
            .await
            .unwrap();
        ledger
            .submit(alice.make_transfer(bob.fingerprint(), 30))
            .await
            .unwrap();
        ledger
            .submit(alice.make_rotation(Seal::from_seed(&[9; 32]).unwrap()))
            .await
            .unwrap();
        ledger
            .submit(alice.make_encrypted(json!({"s": 1}).as_object().cloned().unwrap()))
            .await
            .unwrap();

        let state = ledger
            .get_identity_state(alice.fingerprint())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.nonce, 4);
        assert_eq!(state.balance, 70);
        assert_eq!(state.active_seals.len(), 1);
    }
}
