//! Cryptographic primitives for Sealnet.
//!
//! Wraps SHA-256 hashing and ed25519 seal verification with strong types.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePublicKey, EncodePublicKey};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CoreError;
use crate::types::SealFingerprint;

/// A 32-byte SHA-256 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Compute the SHA-256 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 64-byte ed25519 signature produced by a seal.
///
/// Travels as standard base64 in the external JSON representation.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SealSignature(pub [u8; 64]);

impl SealSignature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, CoreError> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| CoreError::DecodingError(format!("signature: {e}")))?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CoreError::DecodingError("signature must be 64 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SealSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealSig({}...)", &self.to_hex()[..16])
    }
}

impl TryFrom<String> for SealSignature {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_base64(&s)
    }
}

impl From<SealSignature> for String {
    fn from(sig: SealSignature) -> Self {
        sig.to_base64()
    }
}

/// The public half of a seal.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SealPublicKey(VerifyingKey);

impl SealPublicKey {
    /// Create from raw 32-byte ed25519 key material.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CoreError> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|e| CoreError::MalformedKeyBytes(e.to_string()))
    }

    /// Parse a PEM SubjectPublicKeyInfo document.
    pub fn from_pem(pem: &str) -> Result<Self, CoreError> {
        VerifyingKey::from_public_key_pem(pem)
            .map(Self)
            .map_err(|e| CoreError::MalformedKeyBytes(e.to_string()))
    }

    /// Serialize as a PEM SubjectPublicKeyInfo document.
    pub fn to_pem(&self) -> Result<String, CoreError> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Get the raw bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn fingerprint(&self) -> SealFingerprint {
        SealFingerprint::derive(&self.to_bytes())
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &SealSignature) -> Result<(), CoreError> {
        let sig = Signature::from_bytes(&signature.0);
        self.0
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }

    pub(crate) fn from_verifying_key(key: VerifyingKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for SealPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealPub({})", &hex::encode(self.to_bytes())[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            Sha256Hash::hash(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_signature_base64_serde() {
        let sig = SealSignature::from_bytes([7u8; 64]);
        let json = serde_json::to_string(&sig).unwrap();
        let back: SealSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, back);
    }

    #[test]
    fn test_signature_rejects_wrong_length() {
        let short = BASE64.encode([0u8; 10]);
        assert!(SealSignature::from_base64(&short).is_err());
        assert!(SealSignature::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_public_key_pem_round_trip() {
        let key = ed25519_dalek::SigningKey::from_bytes(&[0x42; 32]).verifying_key();
        let pk = SealPublicKey::from_verifying_key(key);
        let pem = pk.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(SealPublicKey::from_pem(&pem).unwrap(), pk);
    }

    #[test]
    fn test_public_key_from_garbage_pem() {
        assert!(matches!(
            SealPublicKey::from_pem("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n"),
            Err(CoreError::MalformedKeyBytes(_))
        ));
    }
}
