//! Transactions: signed, replay-protected records of identity actions.
//!
//! A transaction is built unsigned, its canonical bytes are signed by a seal,
//! and the signature is attached once. Nothing mutates a transaction after it
//! has been signed.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::canonical::canonical_json;
use crate::crypto::{SealSignature, Sha256Hash};
use crate::encryption::PayloadKey;
use crate::error::CoreError;
use crate::seal::Seal;
use crate::types::{IdentityFingerprint, SealFingerprint, TransactionId};

/// Transaction format version carried in every transaction.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Payload field holding the recipient of a token transfer.
pub const FIELD_RECIPIENT: &str = "recipient";
/// Payload field holding the amount of a token transfer.
pub const FIELD_AMOUNT: &str = "amount";
/// Payload field naming the incoming seal of a rotation.
pub const FIELD_NEW_SEAL_FINGERPRINT: &str = "new_seal_fingerprint";
/// Payload field holding the base64 PEM public key of the incoming seal.
pub const FIELD_NEW_SEAL_PUBLIC_KEY: &str = "new_seal_public_key";

/// Discriminator for how a payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Data,
    TokenTransfer,
    SealRotation,
    ContractDeploy,
    ContractExecute,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Data => "data",
            TransactionType::TokenTransfer => "token_transfer",
            TransactionType::SealRotation => "seal_rotation",
            TransactionType::ContractDeploy => "contract_deploy",
            TransactionType::ContractExecute => "contract_execute",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(TransactionType::Data),
            "token_transfer" => Ok(TransactionType::TokenTransfer),
            "seal_rotation" => Ok(TransactionType::SealRotation),
            "contract_deploy" => Ok(TransactionType::ContractDeploy),
            "contract_execute" => Ok(TransactionType::ContractExecute),
            other => Err(CoreError::MalformedPayload(format!(
                "unknown transaction type: {other}"
            ))),
        }
    }
}

/// The body of a payload: either a cleartext map or an opaque ciphertext.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadBody {
    Cleartext(Map<String, Value>),
    /// `nonce ‖ ciphertext ‖ tag`, see [`crate::encryption`].
    Encrypted(Vec<u8>),
}

impl PayloadBody {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, PayloadBody::Encrypted(_))
    }

    pub fn as_cleartext(&self) -> Option<&Map<String, Value>> {
        match self {
            PayloadBody::Cleartext(map) => Some(map),
            PayloadBody::Encrypted(_) => None,
        }
    }
}

/// What a transaction carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PayloadWire", into = "PayloadWire")]
pub struct TransactionPayload {
    pub tx_type: TransactionType,
    pub body: PayloadBody,
    pub metadata: Map<String, Value>,
    /// Creation time, Unix seconds.
    pub timestamp: i64,
}

impl TransactionPayload {
    /// A payload stamped with the current time.
    pub fn new(tx_type: TransactionType, body: PayloadBody) -> Self {
        Self {
            tx_type,
            body,
            metadata: Map::new(),
            timestamp: now_secs(),
        }
    }

    /// JSON form used both for signing and for transport.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), json!(self.tx_type.as_str()));
        match &self.body {
            PayloadBody::Cleartext(data) => {
                obj.insert("data".into(), Value::Object(data.clone()));
            }
            PayloadBody::Encrypted(bytes) => {
                obj.insert("encrypted_data".into(), json!(BASE64.encode(bytes)));
            }
        }
        obj.insert("metadata".into(), Value::Object(self.metadata.clone()));
        obj.insert("timestamp".into(), json!(self.timestamp));
        Value::Object(obj)
    }
}

/// External representation of a payload.
#[derive(Serialize, Deserialize)]
struct PayloadWire {
    #[serde(rename = "type")]
    tx_type: TransactionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encrypted_data: Option<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
    timestamp: i64,
}

impl TryFrom<PayloadWire> for TransactionPayload {
    type Error = CoreError;

    fn try_from(wire: PayloadWire) -> Result<Self, Self::Error> {
        let body = match (wire.data, wire.encrypted_data) {
            (Some(data), None) => PayloadBody::Cleartext(data),
            (None, Some(encoded)) => PayloadBody::Encrypted(
                BASE64
                    .decode(encoded)
                    .map_err(|e| CoreError::MalformedPayload(format!("encrypted_data: {e}")))?,
            ),
            (Some(_), Some(_)) => {
                return Err(CoreError::MalformedPayload(
                    "payload carries both data and encrypted_data".into(),
                ))
            }
            (None, None) => {
                return Err(CoreError::MalformedPayload(
                    "payload carries neither data nor encrypted_data".into(),
                ))
            }
        };
        Ok(Self {
            tx_type: wire.tx_type,
            body,
            metadata: wire.metadata,
            timestamp: wire.timestamp,
        })
    }
}

impl From<TransactionPayload> for PayloadWire {
    fn from(payload: TransactionPayload) -> Self {
        let (data, encrypted_data) = match payload.body {
            PayloadBody::Cleartext(map) => (Some(map), None),
            PayloadBody::Encrypted(bytes) => (None, Some(BASE64.encode(bytes))),
        };
        Self {
            tx_type: payload.tx_type,
            data,
            encrypted_data,
            metadata: payload.metadata,
            timestamp: payload.timestamp,
        }
    }
}

fn signing_value(
    identity: &IdentityFingerprint,
    nonce: u64,
    payload: &TransactionPayload,
    seal: &SealFingerprint,
    version: &str,
) -> Value {
    json!({
        "identity_fingerprint": identity.as_str(),
        "nonce": nonce,
        "payload": payload.to_value(),
        "seal_fingerprint": seal.as_str(),
        "version": version,
    })
}

/// A transaction that has not been signed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub identity_fingerprint: IdentityFingerprint,
    pub seal_fingerprint: SealFingerprint,
    pub payload: TransactionPayload,
    pub nonce: u64,
    pub version: String,
}

impl UnsignedTransaction {
    pub(crate) fn signing_value(&self) -> Value {
        signing_value(
            &self.identity_fingerprint,
            self.nonce,
            &self.payload,
            &self.seal_fingerprint,
            &self.version,
        )
    }

    /// The bytes a seal signs.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_json(&self.signing_value())
    }

    pub fn transaction_id(&self) -> TransactionId {
        TransactionId(Sha256Hash::hash(&self.canonical_bytes()).0)
    }

    /// Sign the canonical bytes and attach the signature.
    pub fn sign(self, seal: &Seal) -> Transaction {
        let signature = seal.sign(&self.canonical_bytes());
        Transaction {
            identity_fingerprint: self.identity_fingerprint,
            seal_fingerprint: self.seal_fingerprint,
            payload: self.payload,
            signature,
            nonce: self.nonce,
            version: self.version,
        }
    }
}

/// A signed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub identity_fingerprint: IdentityFingerprint,
    pub seal_fingerprint: SealFingerprint,
    pub payload: TransactionPayload,
    pub signature: SealSignature,
    pub nonce: u64,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl Transaction {
    pub(crate) fn signing_value(&self) -> Value {
        signing_value(
            &self.identity_fingerprint,
            self.nonce,
            &self.payload,
            &self.seal_fingerprint,
            &self.version,
        )
    }

    /// The bytes the signature covers.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_json(&self.signing_value())
    }

    /// Content address: SHA-256 of the canonical bytes.
    ///
    /// The signature is not part of the id.
    pub fn id(&self) -> TransactionId {
        TransactionId(Sha256Hash::hash(&self.canonical_bytes()).0)
    }

    pub fn tx_type(&self) -> TransactionType {
        self.payload.tx_type
    }

    pub fn timestamp(&self) -> i64 {
        self.payload.timestamp
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self, CoreError> {
        serde_json::from_str(s).map_err(|e| CoreError::DecodingError(e.to_string()))
    }

    /// Decrypt an encrypted data payload back into its JSON map.
    ///
    /// Only the holder of the signing seal (or a copy of its private bytes)
    /// can do this.
    pub fn decrypt_payload(&self, seal: &Seal) -> Result<Map<String, Value>, CoreError> {
        let PayloadBody::Encrypted(blob) = &self.payload.body else {
            return Err(CoreError::MalformedPayload("payload is not encrypted".into()));
        };
        let key = PayloadKey::derive(&seal.export_private())?;
        let plaintext = key.decrypt(blob)?;
        serde_json::from_slice(&plaintext).map_err(|_| CoreError::DecryptionError)
    }
}

/// Builder for signed transactions.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    identity_fingerprint: IdentityFingerprint,
    tx_type: TransactionType,
    nonce: u64,
    data: Map<String, Value>,
    metadata: Map<String, Value>,
    timestamp: Option<i64>,
    encrypt: bool,
}

impl TransactionBuilder {
    /// Start building a transaction.
    pub fn new(identity_fingerprint: IdentityFingerprint, tx_type: TransactionType, nonce: u64) -> Self {
        Self {
            identity_fingerprint,
            tx_type,
            nonce,
            data: Map::new(),
            metadata: Map::new(),
            timestamp: None,
            encrypt: false,
        }
    }

    /// Set the payload data.
    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Set the metadata.
    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the timestamp (Unix seconds). Defaults to now.
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Encrypt the data under the signing seal's payload key.
    pub fn encrypted(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Build the unsigned transaction for the given seal.
    pub fn build(self, seal: &Seal) -> Result<UnsignedTransaction, CoreError> {
        let body = if self.encrypt {
            if self.tx_type != TransactionType::Data {
                return Err(CoreError::EncryptionNotSupportedForType(self.tx_type));
            }
            let key = PayloadKey::derive(&seal.export_private())?;
            let plaintext = canonical_json(&Value::Object(self.data));
            PayloadBody::Encrypted(key.encrypt(&plaintext)?)
        } else {
            PayloadBody::Cleartext(self.data)
        };

        Ok(UnsignedTransaction {
            identity_fingerprint: self.identity_fingerprint,
            seal_fingerprint: seal.fingerprint(),
            payload: TransactionPayload {
                tx_type: self.tx_type,
                body,
                metadata: self.metadata,
                timestamp: self.timestamp.unwrap_or_else(now_secs),
            },
            nonce: self.nonce,
            version: PROTOCOL_VERSION.to_string(),
        })
    }

    /// Build and sign the transaction.
    pub fn sign(self, seal: &Seal) -> Result<Transaction, CoreError> {
        Ok(self.build(seal)?.sign(seal))
    }
}

/// Current time in Unix seconds.
pub fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> IdentityFingerprint {
        "pk:3d4c030534b1c1c6".parse().unwrap()
    }

    fn data(pairs: Value) -> Map<String, Value> {
        pairs.as_object().cloned().unwrap()
    }

    #[test]
    fn test_transaction_type_names() {
        for t in [
            TransactionType::Data,
            TransactionType::TokenTransfer,
            TransactionType::SealRotation,
            TransactionType::ContractDeploy,
            TransactionType::ContractExecute,
        ] {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
            assert_eq!(serde_json::to_value(t).unwrap(), json!(t.as_str()));
        }
        assert!("mint".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_signature_verifies_over_canonical_bytes() {
        let seal = Seal::from_seed(&[0x42; 32]).unwrap();
        let tx = TransactionBuilder::new(identity(), TransactionType::Data, 0)
            .data(data(json!({"msg": "hi"})))
            .timestamp(1)
            .sign(&seal)
            .unwrap();
        seal.public_key()
            .verify(&tx.canonical_bytes(), &tx.signature)
            .unwrap();
    }

    #[test]
    fn test_id_matches_unsigned_id() {
        let seal = Seal::from_seed(&[0x42; 32]).unwrap();
        let unsigned = TransactionBuilder::new(identity(), TransactionType::Data, 4)
            .timestamp(99)
            .build(&seal)
            .unwrap();
        let expected = unsigned.transaction_id();
        assert_eq!(unsigned.sign(&seal).id(), expected);
    }

    #[test]
    fn test_id_changes_with_timestamp() {
        let seal = Seal::from_seed(&[0x42; 32]).unwrap();
        let a = TransactionBuilder::new(identity(), TransactionType::Data, 0)
            .timestamp(100)
            .sign(&seal)
            .unwrap();
        let b = TransactionBuilder::new(identity(), TransactionType::Data, 0)
            .timestamp(101)
            .sign(&seal)
            .unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_canonical_omits_absent_body_field() {
        let seal = Seal::from_seed(&[0x42; 32]).unwrap();
        let tx = TransactionBuilder::new(identity(), TransactionType::Data, 0)
            .encrypted(true)
            .data(data(json!({"k": "v"})))
            .timestamp(5)
            .sign(&seal)
            .unwrap();
        let text = String::from_utf8(tx.canonical_bytes()).unwrap();
        assert!(text.contains("\"encrypted_data\": "));
        assert!(!text.contains("\"data\""));
        assert!(!text.contains("null"));
        assert!(!text.contains("signature"));
    }

    #[test]
    fn test_encryption_rejected_for_non_data() {
        let seal = Seal::generate();
        let err = TransactionBuilder::new(identity(), TransactionType::TokenTransfer, 0)
            .encrypted(true)
            .sign(&seal)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::EncryptionNotSupportedForType(TransactionType::TokenTransfer)
        ));
    }

    #[test]
    fn test_decrypt_payload() {
        let seal = Seal::generate();
        let secret = data(json!({"diagnosis": "none", "score": 3}));
        let tx = TransactionBuilder::new(identity(), TransactionType::Data, 0)
            .data(secret.clone())
            .encrypted(true)
            .sign(&seal)
            .unwrap();
        assert_eq!(tx.decrypt_payload(&seal).unwrap(), secret);

        let stranger = Seal::generate();
        assert!(matches!(
            tx.decrypt_payload(&stranger),
            Err(CoreError::DecryptionError)
        ));
    }

    #[test]
    fn test_json_round_trip_preserves_id() {
        let seal = Seal::generate();
        let tx = TransactionBuilder::new(identity(), TransactionType::Data, 2)
            .data(data(json!({"a": [1, 2, {"b": null}]})))
            .metadata(data(json!({"source": "test"})))
            .sign(&seal)
            .unwrap();
        let back = Transaction::from_json(&tx.to_json().unwrap()).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.id(), tx.id());
    }

    #[test]
    fn test_wire_payload_must_have_exactly_one_body() {
        let both = r#"{"type":"data","data":{},"encrypted_data":"AAAA","metadata":{},"timestamp":1}"#;
        let neither = r#"{"type":"data","metadata":{},"timestamp":1}"#;
        assert!(serde_json::from_str::<TransactionPayload>(both).is_err());
        assert!(serde_json::from_str::<TransactionPayload>(neither).is_err());

        let ok = r#"{"type":"data","data":{"x":1},"timestamp":1}"#;
        let payload: TransactionPayload = serde_json::from_str(ok).unwrap();
        assert!(payload.metadata.is_empty());
        assert_eq!(payload.body.as_cleartext().unwrap()["x"], json!(1));
    }
}
