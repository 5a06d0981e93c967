//! Golden test vectors for deterministic verification.
//!
//! These vectors ensure that canonical encoding, transaction ids and seal
//! signatures come out identical across all implementations.

use serde_json::{json, Map, Value};

use sealnet_core::{
    IdentityKeyPair, PayloadBody, Seal, TransactionBuilder, TransactionPayload, TransactionType,
    UnsignedTransaction, PROTOCOL_VERSION,
};

/// Identity key seed shared by every vector.
pub const IDENTITY_SEED: [u8; 32] = [0x01; 32];

/// Seal seed shared by every vector.
pub const SEAL_SEED: [u8; 32] = [0x42; 32];

/// Fingerprint of the identity derived from [`IDENTITY_SEED`].
pub const IDENTITY_FINGERPRINT: &str = "pk:3d4c030534b1c1c6";

/// Fingerprint of the seal derived from [`SEAL_SEED`].
pub const SEAL_FINGERPRINT: &str = "seal:14ccab5b8e2bdaeb";

/// Payload encryption key derived from [`SEAL_SEED`] (hex).
pub const PAYLOAD_KEY: &str = "f13e0a0a07acd7c50bc1b23b57b6f85af3bdf2025794038b67b04be4f06ee35d";

/// Body of a golden transaction.
#[derive(Debug, Clone)]
pub enum VectorBody {
    /// JSON object text.
    Cleartext(&'static str),
    /// Raw ciphertext bytes, carried as-is.
    Encrypted(Vec<u8>),
}

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub tx_type: TransactionType,
    pub nonce: u64,
    pub body: VectorBody,
    /// Metadata as JSON object text.
    pub metadata: &'static str,
    /// Timestamp, Unix seconds.
    pub timestamp: i64,
    /// Expected canonical bytes as UTF-8 text.
    pub expected_canonical: &'static str,
    /// Expected transaction id, `tx:`-prefixed.
    pub expected_id: &'static str,
    /// Expected seal signature (hex); empty if not pinned.
    pub expected_signature: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "cleartext data",
            tx_type: TransactionType::Data,
            nonce: 0,
            body: VectorBody::Cleartext(r#"{"msg": "hi", "n": 7}"#),
            metadata: "{}",
            timestamp: 1736870400,
            expected_canonical: r#"{"identity_fingerprint": "pk:3d4c030534b1c1c6", "nonce": 0, "payload": {"data": {"msg": "hi", "n": 7}, "metadata": {}, "timestamp": 1736870400, "type": "data"}, "seal_fingerprint": "seal:14ccab5b8e2bdaeb", "version": "1.0"}"#,
            expected_id: "tx:faaa63440b4135c8b579f6da9a5c8947765e2c9f75a0e1b7b348251324c5e4df",
            expected_signature: "99f0f9600ff7df5052525e282751f21dc65cf6819586ea81fc9906e2dad6d897c2dcb89dcb1ba6ab6addf5f01f23624a32a67da5af3d18f36abfe1706726cc05",
        },
        GoldenVector {
            name: "token transfer with non-ascii memo",
            tx_type: TransactionType::TokenTransfer,
            nonce: 3,
            body: VectorBody::Cleartext(r#"{"recipient": "pk:00000000000000ff", "amount": 250}"#),
            metadata: r#"{"memo": "café"}"#,
            timestamp: 1736870500,
            expected_canonical: r#"{"identity_fingerprint": "pk:3d4c030534b1c1c6", "nonce": 3, "payload": {"data": {"amount": 250, "recipient": "pk:00000000000000ff"}, "metadata": {"memo": "caf\u00e9"}, "timestamp": 1736870500, "type": "token_transfer"}, "seal_fingerprint": "seal:14ccab5b8e2bdaeb", "version": "1.0"}"#,
            expected_id: "tx:9d59181a212a861667c554f8e9de8ce9eff7372ab0aed82dcd84eb2735dc9ba1",
            expected_signature: "",
        },
        GoldenVector {
            name: "encrypted data",
            tx_type: TransactionType::Data,
            nonce: 1,
            body: VectorBody::Encrypted((0u8..40).collect()),
            metadata: "{}",
            timestamp: 1736870600,
            expected_canonical: r#"{"identity_fingerprint": "pk:3d4c030534b1c1c6", "nonce": 1, "payload": {"encrypted_data": "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8gISIjJCUmJw==", "metadata": {}, "timestamp": 1736870600, "type": "data"}, "seal_fingerprint": "seal:14ccab5b8e2bdaeb", "version": "1.0"}"#,
            expected_id: "tx:2a8a744275bf082a7e9c241036532bd6b6870da3d4692803d17480401bcbf5bf",
            expected_signature: "",
        },
    ]
}

fn object(text: &str) -> Map<String, Value> {
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => map,
        _ => panic!("vector field is not a JSON object: {text}"),
    }
}

/// The identity and seal every vector is signed with.
pub fn vector_keys() -> (IdentityKeyPair, Seal) {
    let keys = IdentityKeyPair::ed25519_from_seed(&IDENTITY_SEED)
        .unwrap_or_else(|e| panic!("identity key: {e}"));
    let seal = Seal::from_seed(&SEAL_SEED).unwrap_or_else(|e| panic!("seal key: {e}"));
    (keys, seal)
}

/// Build the unsigned transaction a vector describes.
pub fn unsigned_from_vector(vector: &GoldenVector) -> UnsignedTransaction {
    let (keys, seal) = vector_keys();
    let metadata = object(vector.metadata);
    match &vector.body {
        VectorBody::Cleartext(data) => {
            TransactionBuilder::new(keys.fingerprint().clone(), vector.tx_type, vector.nonce)
                .data(object(data))
                .metadata(metadata)
                .timestamp(vector.timestamp)
                .build(&seal)
                .unwrap_or_else(|e| panic!("vector {}: {e}", vector.name))
        }
        VectorBody::Encrypted(blob) => {
            let mut payload =
                TransactionPayload::new(vector.tx_type, PayloadBody::Encrypted(blob.clone()));
            payload.metadata = metadata;
            payload.timestamp = vector.timestamp;
            UnsignedTransaction {
                identity_fingerprint: keys.fingerprint().clone(),
                seal_fingerprint: seal.fingerprint(),
                payload,
                nonce: vector.nonce,
                version: PROTOCOL_VERSION.to_string(),
            }
        }
    }
}

/// Result of checking one vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorReport {
    pub name: String,
    pub matches: bool,
    pub id: String,
}

/// Verify all golden vectors.
///
/// Call this to verify your implementation matches the reference.
pub fn verify_all_vectors() -> Vec<VectorReport> {
    let (_, seal) = vector_keys();
    all_vectors()
        .iter()
        .map(|v| {
            let unsigned = unsigned_from_vector(v);
            let canonical = unsigned.canonical_bytes();
            let id = unsigned.transaction_id().to_string();
            let signature = unsigned.sign(&seal).signature.to_hex();

            let matches = canonical == v.expected_canonical.as_bytes()
                && id == v.expected_id
                && (v.expected_signature.is_empty() || signature == v.expected_signature);

            VectorReport {
                name: v.name.to_string(),
                matches,
                id,
            }
        })
        .collect()
}

/// Sample payload used by benches and smoke tests.
pub fn sample_payload() -> Map<String, Value> {
    json!({
        "entity": "Clayton High School",
        "score": 90,
        "violations": [1, 2, 3],
        "nested": {"b": true, "a": null},
        "note": "naïve résumé",
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        for report in verify_all_vectors() {
            assert!(report.matches, "vector '{}' diverged: {}", report.name, report.id);
        }
    }

    #[test]
    fn test_key_fingerprints() {
        let (keys, seal) = vector_keys();
        assert_eq!(keys.fingerprint().as_str(), IDENTITY_FINGERPRINT);
        assert_eq!(seal.fingerprint().as_str(), SEAL_FINGERPRINT);
    }

    #[test]
    fn test_payload_key() {
        let key = sealnet_core::derive_key(&SEAL_SEED).unwrap();
        assert_eq!(hex::encode(key.as_bytes()), PAYLOAD_KEY);
    }

    #[test]
    fn test_vectors_are_deterministic() {
        for vector in all_vectors() {
            let a = unsigned_from_vector(&vector);
            let b = unsigned_from_vector(&vector);
            assert_eq!(
                a.canonical_bytes(),
                b.canonical_bytes(),
                "Vector '{}' produced different canonical bytes",
                vector.name
            );
        }
    }
}
