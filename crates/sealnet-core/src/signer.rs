//! Convenience constructors for signed transactions.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{Map, Value};

use crate::crypto::SealSignature;
use crate::error::CoreError;
use crate::seal::Seal;
use crate::transaction::{
    Transaction, TransactionBuilder, TransactionType, FIELD_NEW_SEAL_FINGERPRINT,
    FIELD_NEW_SEAL_PUBLIC_KEY,
};
use crate::types::IdentityFingerprint;

/// Sign canonical transaction bytes with a seal.
pub fn sign(seal: &Seal, canonical_bytes: &[u8]) -> SealSignature {
    seal.sign(canonical_bytes)
}

/// Build, optionally encrypt, and sign a transaction stamped with the current time.
///
/// Encryption applies only to `data` payloads; requesting it for any other
/// type fails with [`CoreError::EncryptionNotSupportedForType`].
pub fn create_signed_transaction(
    identity_fingerprint: &IdentityFingerprint,
    seal: &Seal,
    tx_type: TransactionType,
    payload_data: Map<String, Value>,
    nonce: u64,
    encrypt_payload: bool,
) -> Result<Transaction, CoreError> {
    TransactionBuilder::new(identity_fingerprint.clone(), tx_type, nonce)
        .data(payload_data)
        .encrypted(encrypt_payload)
        .sign(seal)
}

/// Payload data announcing `new_seal` as the successor seal.
pub fn seal_rotation_data(new_seal: &Seal) -> Result<Map<String, Value>, CoreError> {
    let pem = new_seal.public_key_pem()?;
    let mut data = Map::new();
    data.insert(
        FIELD_NEW_SEAL_FINGERPRINT.into(),
        Value::String(new_seal.fingerprint().to_string()),
    );
    data.insert(
        FIELD_NEW_SEAL_PUBLIC_KEY.into(),
        Value::String(BASE64.encode(pem.as_bytes())),
    );
    Ok(data)
}

/// Build a rotation from `old_seal` to `new_seal`, signed by the old seal.
pub fn create_seal_rotation(
    identity_fingerprint: &IdentityFingerprint,
    old_seal: &Seal,
    new_seal: &Seal,
    nonce: u64,
) -> Result<Transaction, CoreError> {
    create_signed_transaction(
        identity_fingerprint,
        old_seal,
        TransactionType::SealRotation,
        seal_rotation_data(new_seal)?,
        nonce,
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SealPublicKey;
    use crate::transaction::PayloadBody;
    use serde_json::json;

    fn identity() -> IdentityFingerprint {
        "pk:0000000000000001".parse().unwrap()
    }

    #[test]
    fn test_create_signed_transaction() {
        let seal = Seal::generate();
        let data = json!({"k": 1}).as_object().cloned().unwrap();
        let tx = create_signed_transaction(&identity(), &seal, TransactionType::Data, data.clone(), 7, false)
            .unwrap();
        assert_eq!(tx.nonce, 7);
        assert_eq!(tx.seal_fingerprint, seal.fingerprint());
        assert_eq!(tx.payload.body, PayloadBody::Cleartext(data));
        assert_eq!(tx.signature, sign(&seal, &tx.canonical_bytes()));
    }

    #[test]
    fn test_encrypted_transfer_rejected() {
        let seal = Seal::generate();
        let result = create_signed_transaction(
            &identity(),
            &seal,
            TransactionType::TokenTransfer,
            Map::new(),
            0,
            true,
        );
        assert!(matches!(result, Err(CoreError::EncryptionNotSupportedForType(_))));
    }

    #[test]
    fn test_seal_rotation_payload() {
        let old = Seal::generate();
        let new = Seal::generate();
        let tx = create_seal_rotation(&identity(), &old, &new, 1).unwrap();
        assert_eq!(tx.tx_type(), TransactionType::SealRotation);
        assert_eq!(tx.seal_fingerprint, old.fingerprint());

        let data = tx.payload.body.as_cleartext().unwrap();
        assert_eq!(data[FIELD_NEW_SEAL_FINGERPRINT], json!(new.fingerprint().to_string()));
        let pem_bytes = BASE64
            .decode(data[FIELD_NEW_SEAL_PUBLIC_KEY].as_str().unwrap())
            .unwrap();
        let pk = SealPublicKey::from_pem(std::str::from_utf8(&pem_bytes).unwrap()).unwrap();
        assert_eq!(pk.fingerprint(), new.fingerprint());
    }
}
