//! Golden vectors for cross-implementation verification.
//!
//! Every implementation of the Sealnet wire format must produce identical:
//! - identity and seal fingerprints
//! - canonical bytes
//! - transaction id
//! - signature (deterministic Ed25519)
//!
//! The values below were produced by an independent implementation from the
//! same seeds.

use sealnet::core::{
    IdentityKeyPair, PayloadBody, Seal, TransactionPayload, TransactionType, UnsignedTransaction,
    PROTOCOL_VERSION,
};
use sealnet::store::MemoryStore;
use sealnet::{Ledger, LedgerConfig, RegistrationRequest, Transaction, TransactionBuilder};
use serde_json::{json, Map, Value};

const IDENTITY_SEED: [u8; 32] = [0x01; 32];
const SEAL_SEED: [u8; 32] = [0x42; 32];

const IDENTITY_FINGERPRINT: &str = "pk:3d4c030534b1c1c6";
const SEAL_FINGERPRINT: &str = "seal:14ccab5b8e2bdaeb";

fn map(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

fn fixture() -> (IdentityKeyPair, Seal) {
    (
        IdentityKeyPair::ed25519_from_seed(&IDENTITY_SEED).unwrap(),
        Seal::from_seed(&SEAL_SEED).unwrap(),
    )
}

fn data_transaction() -> Transaction {
    let (keys, seal) = fixture();
    TransactionBuilder::new(keys.fingerprint().clone(), TransactionType::Data, 0)
        .data(map(json!({"msg": "hi", "n": 7})))
        .timestamp(1736870400)
        .sign(&seal)
        .unwrap()
}

#[test]
fn test_fingerprints() {
    let (keys, seal) = fixture();
    assert_eq!(keys.fingerprint().as_str(), IDENTITY_FINGERPRINT);
    assert_eq!(seal.fingerprint().as_str(), SEAL_FINGERPRINT);
    assert_eq!(
        String::from_utf8(keys.public_key().key_bytes.clone()).unwrap(),
        "-----BEGIN PUBLIC KEY-----\nMCowBQYDK2VwAyEAiojj3XQJ8ZX9UtstPLpdcspnCb8dlBIb83SIAbQPb1w=\n-----END PUBLIC KEY-----\n"
    );
    assert_eq!(
        Seal::from_seed(b"short seed").unwrap().fingerprint().as_str(),
        "seal:2914cc530b48273f"
    );
}

#[test]
fn test_data_transaction_vector() {
    let tx = data_transaction();
    assert_eq!(
        String::from_utf8(tx.canonical_bytes()).unwrap(),
        r#"{"identity_fingerprint": "pk:3d4c030534b1c1c6", "nonce": 0, "payload": {"data": {"msg": "hi", "n": 7}, "metadata": {}, "timestamp": 1736870400, "type": "data"}, "seal_fingerprint": "seal:14ccab5b8e2bdaeb", "version": "1.0"}"#
    );
    assert_eq!(
        tx.id().to_string(),
        "tx:faaa63440b4135c8b579f6da9a5c8947765e2c9f75a0e1b7b348251324c5e4df"
    );
    assert_eq!(
        tx.signature.to_hex(),
        "99f0f9600ff7df5052525e282751f21dc65cf6819586ea81fc9906e2dad6d897c2dcb89dcb1ba6ab6addf5f01f23624a32a67da5af3d18f36abfe1706726cc05"
    );
}

#[test]
fn test_transfer_vector_escapes_non_ascii() {
    let (keys, seal) = fixture();
    let tx = TransactionBuilder::new(keys.fingerprint().clone(), TransactionType::TokenTransfer, 3)
        .data(map(json!({"recipient": "pk:00000000000000ff", "amount": 250})))
        .metadata(map(json!({"memo": "café"})))
        .timestamp(1736870500)
        .sign(&seal)
        .unwrap();
    assert_eq!(
        String::from_utf8(tx.canonical_bytes()).unwrap(),
        r#"{"identity_fingerprint": "pk:3d4c030534b1c1c6", "nonce": 3, "payload": {"data": {"amount": 250, "recipient": "pk:00000000000000ff"}, "metadata": {"memo": "caf\u00e9"}, "timestamp": 1736870500, "type": "token_transfer"}, "seal_fingerprint": "seal:14ccab5b8e2bdaeb", "version": "1.0"}"#
    );
    assert_eq!(
        tx.id().to_string(),
        "tx:9d59181a212a861667c554f8e9de8ce9eff7372ab0aed82dcd84eb2735dc9ba1"
    );
}

#[test]
fn test_encrypted_body_vector() {
    let (keys, seal) = fixture();
    let mut payload = TransactionPayload::new(
        TransactionType::Data,
        PayloadBody::Encrypted((0u8..40).collect()),
    );
    payload.timestamp = 1736870600;
    let unsigned = UnsignedTransaction {
        identity_fingerprint: keys.fingerprint().clone(),
        seal_fingerprint: seal.fingerprint(),
        payload,
        nonce: 1,
        version: PROTOCOL_VERSION.to_string(),
    };
    assert_eq!(
        String::from_utf8(unsigned.canonical_bytes()).unwrap(),
        r#"{"identity_fingerprint": "pk:3d4c030534b1c1c6", "nonce": 1, "payload": {"encrypted_data": "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8gISIjJCUmJw==", "metadata": {}, "timestamp": 1736870600, "type": "data"}, "seal_fingerprint": "seal:14ccab5b8e2bdaeb", "version": "1.0"}"#
    );
    assert_eq!(
        unsigned.transaction_id().to_string(),
        "tx:2a8a744275bf082a7e9c241036532bd6b6870da3d4692803d17480401bcbf5bf"
    );
}

#[test]
fn test_wire_round_trip_preserves_id() -> anyhow::Result<()> {
    let tx = data_transaction();
    let wire = tx.to_json()?;
    let parsed = Transaction::from_json(&wire)?;
    assert_eq!(parsed, tx);
    assert_eq!(parsed.id(), tx.id());
    Ok(())
}

#[tokio::test]
async fn test_golden_transaction_is_accepted() {
    let (keys, seal) = fixture();
    let ledger = Ledger::new(MemoryStore::new(), LedgerConfig::default()).unwrap();
    ledger
        .register_identity(RegistrationRequest {
            identity_public_key: String::from_utf8(keys.public_key().key_bytes.clone()).unwrap(),
            identity_key_type: keys.key_type(),
            identity_fingerprint: keys.fingerprint().clone(),
            seal_public_key: seal.public_key_pem().unwrap(),
            seal_fingerprint: seal.fingerprint(),
            initial_balance: 0,
        })
        .await
        .unwrap();

    let id = ledger.submit(data_transaction()).await.unwrap();
    assert_eq!(
        id.to_string(),
        "tx:faaa63440b4135c8b579f6da9a5c8947765e2c9f75a0e1b7b348251324c5e4df"
    );
}
