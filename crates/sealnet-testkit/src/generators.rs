//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use sealnet_core::{
    IdentityFingerprint, IdentityKeyPair, Seal, SealFingerprint, Transaction, TransactionBuilder,
    TransactionId, TransactionType,
};

/// Generate a seal from a random seed.
pub fn seal() -> impl Strategy<Value = Seal> {
    any::<[u8; 32]>().prop_map(|seed| {
        Seal::from_seed(&seed).unwrap_or_else(|e| panic!("seal from seed: {e}"))
    })
}

/// Generate a well-formed identity fingerprint.
pub fn identity_fingerprint() -> impl Strategy<Value = IdentityFingerprint> {
    any::<[u8; 8]>().prop_map(|b| {
        format!("pk:{}", hex::encode(b))
            .parse()
            .unwrap_or_else(|e| panic!("fingerprint: {e}"))
    })
}

/// Generate a well-formed seal fingerprint.
pub fn seal_fingerprint() -> impl Strategy<Value = SealFingerprint> {
    any::<[u8; 8]>().prop_map(|b| {
        format!("seal:{}", hex::encode(b))
            .parse()
            .unwrap_or_else(|e| panic!("fingerprint: {e}"))
    })
}

/// Generate a random TransactionId.
pub fn transaction_id() -> impl Strategy<Value = TransactionId> {
    any::<[u8; 32]>().prop_map(TransactionId::from_bytes)
}

/// Generate a transaction type the validator has rules for.
pub fn transaction_type() -> impl Strategy<Value = TransactionType> {
    prop_oneof![
        Just(TransactionType::Data),
        Just(TransactionType::TokenTransfer),
        Just(TransactionType::SealRotation),
    ]
}

/// Generate a reasonable timestamp in Unix seconds.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800i64
}

/// Generate a JSON scalar.
pub fn json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        ".{0,24}".prop_map(Value::String),
    ]
}

/// Generate a flat JSON object with up to `max_len` keys.
pub fn json_map(max_len: usize) -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(".{0,12}", json_scalar(), 0..=max_len)
        .prop_map(|m| m.into_iter().collect())
}

/// Parameters for generating a transaction.
#[derive(Debug, Clone)]
pub struct TxParams {
    pub identity_seed: [u8; 32],
    pub seal_seed: [u8; 32],
    pub tx_type: TransactionType,
    pub nonce: u64,
    pub timestamp: i64,
    pub data: Map<String, Value>,
    pub metadata: Map<String, Value>,
}

impl Arbitrary for TxParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(), // identity seed
            any::<[u8; 32]>(), // seal seed
            transaction_type(),
            0u64..=1_000_000u64, // nonce
            timestamp(),
            json_map(8),
            json_map(3),
        )
            .prop_map(
                |(identity_seed, seal_seed, tx_type, nonce, timestamp, data, metadata)| TxParams {
                    identity_seed,
                    seal_seed,
                    tx_type,
                    nonce,
                    timestamp,
                    data,
                    metadata,
                },
            )
            .boxed()
    }
}

/// Build and sign a cleartext transaction from parameters.
pub fn transaction_from_params(params: &TxParams) -> Transaction {
    let keys = IdentityKeyPair::ed25519_from_seed(&params.identity_seed)
        .unwrap_or_else(|e| panic!("identity key: {e}"));
    let seal = Seal::from_seed(&params.seal_seed).unwrap_or_else(|e| panic!("seal key: {e}"));

    TransactionBuilder::new(keys.fingerprint().clone(), params.tx_type, params.nonce)
        .data(params.data.clone())
        .metadata(params.metadata.clone())
        .timestamp(params.timestamp)
        .sign(&seal)
        .unwrap_or_else(|e| panic!("signing: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealnet_core::{canonical_json, decrypt, derive_key, encrypt, CoreError};

    proptest! {
        #[test]
        fn test_transaction_id_deterministic(params: TxParams) {
            let t1 = transaction_from_params(&params);
            let t2 = transaction_from_params(&params);

            prop_assert_eq!(t1.id(), t2.id());
            prop_assert_eq!(t1.signature, t2.signature);
        }

        #[test]
        fn test_canonical_bytes_ignore_insertion_order(data in json_map(8)) {
            let forward: Map<String, Value> = data.clone().into_iter().collect();
            let reversed: Map<String, Value> = data.into_iter().rev().collect();

            prop_assert_eq!(
                canonical_json(&Value::Object(forward)),
                canonical_json(&Value::Object(reversed))
            );
        }

        #[test]
        fn test_canonical_bytes_are_ascii(params: TxParams) {
            let tx = transaction_from_params(&params);
            prop_assert!(tx.canonical_bytes().is_ascii());
        }

        #[test]
        fn test_transaction_id_sensitive_to_nonce(params: TxParams) {
            let t1 = transaction_from_params(&params);
            let t2 = transaction_from_params(&TxParams { nonce: params.nonce + 1, ..params });

            prop_assert_ne!(t1.id(), t2.id());
        }

        #[test]
        fn test_transaction_survives_wire_round_trip(params: TxParams) {
            let tx = transaction_from_params(&params);
            let wire = tx.to_json().unwrap();
            let parsed = Transaction::from_json(&wire).unwrap();

            prop_assert_eq!(parsed.id(), tx.id());
        }

        #[test]
        fn test_wrong_seal_cannot_decrypt(
            a in any::<[u8; 32]>(),
            b in any::<[u8; 32]>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            prop_assume!(a != b);
            let blob = encrypt(&plaintext, &derive_key(&a).unwrap()).unwrap();

            prop_assert_eq!(decrypt(&blob, &derive_key(&a).unwrap()).unwrap(), plaintext);
            prop_assert!(matches!(
                decrypt(&blob, &derive_key(&b).unwrap()),
                Err(CoreError::DecryptionError)
            ));
        }
    }
}
