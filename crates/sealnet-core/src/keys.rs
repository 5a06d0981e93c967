//! Identity key material.
//!
//! An identity is an ed25519 or RSA-2048 key pair. Its public half is kept as a
//! PEM SubjectPublicKeyInfo document and the identity is addressed by the
//! fingerprint of those exact bytes. Identity keys never sign transactions
//! directly; they delegate to seals.

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePublicKey as _, EncodePublicKey as _};
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rsa::pkcs1v15;
use rsa::pkcs8::{DecodePublicKey as _, EncodePublicKey as _};
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding as _, Signer as _, Verifier as _};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::IdentityFingerprint;

/// RSA modulus size for identity keys.
pub const RSA_KEY_BITS: usize = 2048;

/// RSA public exponent for identity keys.
pub const RSA_PUBLIC_EXPONENT: u32 = 65537;

/// Supported identity key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Ed25519,
    Rsa,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
            KeyType::Rsa => "rsa",
        }
    }
}

impl FromStr for KeyType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ed25519" => Ok(KeyType::Ed25519),
            "rsa" => Ok(KeyType::Rsa),
            other => Err(CoreError::UnsupportedKeyType(other.to_string())),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the identity fingerprint of serialized public key bytes.
pub fn fingerprint(public_key_bytes: &[u8]) -> IdentityFingerprint {
    IdentityFingerprint::derive(public_key_bytes)
}

enum SecretKey {
    Ed25519(SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

/// An identity key pair.
pub struct IdentityKeyPair {
    secret: SecretKey,
    public: IdentityPublicKey,
}

impl IdentityKeyPair {
    /// Generate a fresh random key pair of the given type.
    pub fn generate(key_type: KeyType) -> Result<Self, CoreError> {
        let mut rng = rand::thread_rng();
        match key_type {
            KeyType::Ed25519 => Self::from_ed25519(SigningKey::generate(&mut rng)),
            KeyType::Rsa => {
                let exponent = BigUint::from(RSA_PUBLIC_EXPONENT);
                let key = RsaPrivateKey::new_with_exp(&mut rng, RSA_KEY_BITS, &exponent)
                    .map_err(|e| CoreError::MalformedKeyBytes(e.to_string()))?;
                Self::from_rsa(key)
            }
        }
    }

    /// Deterministic ed25519 identity from a 32-byte seed.
    pub fn ed25519_from_seed(seed: &[u8; 32]) -> Result<Self, CoreError> {
        Self::from_ed25519(SigningKey::from_bytes(seed))
    }

    fn from_ed25519(signing_key: SigningKey) -> Result<Self, CoreError> {
        let pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(Self {
            secret: SecretKey::Ed25519(signing_key),
            public: IdentityPublicKey::new(KeyType::Ed25519, pem.into_bytes()),
        })
    }

    fn from_rsa(key: RsaPrivateKey) -> Result<Self, CoreError> {
        let pem = key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(Self {
            secret: SecretKey::Rsa(Box::new(key)),
            public: IdentityPublicKey::new(KeyType::Rsa, pem.into_bytes()),
        })
    }

    pub fn key_type(&self) -> KeyType {
        self.public.key_type
    }

    pub fn public_key(&self) -> &IdentityPublicKey {
        &self.public
    }

    pub fn fingerprint(&self) -> &IdentityFingerprint {
        &self.public.fingerprint
    }

    /// Sign a message with the identity key.
    ///
    /// RSA identities sign with PKCS#1 v1.5 over SHA-256.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match &self.secret {
            SecretKey::Ed25519(key) => key.sign(message).to_bytes().to_vec(),
            SecretKey::Rsa(key) => {
                let signer = pkcs1v15::SigningKey::<Sha256>::new((**key).clone());
                signer.sign(message).to_vec()
            }
        }
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKeyPair({}, {})", self.key_type(), self.fingerprint())
    }
}

/// The public half of an identity, as registered with the ledger.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPublicKey {
    pub key_type: KeyType,
    /// PEM SubjectPublicKeyInfo bytes, exactly as fingerprinted.
    pub key_bytes: Vec<u8>,
    pub fingerprint: IdentityFingerprint,
}

impl IdentityPublicKey {
    /// Wrap serialized key bytes, computing their fingerprint.
    pub fn new(key_type: KeyType, key_bytes: Vec<u8>) -> Self {
        let fingerprint = fingerprint(&key_bytes);
        Self {
            key_type,
            key_bytes,
            fingerprint,
        }
    }

    /// Whether the stored bytes reconstruct a valid key of the declared type.
    ///
    /// Never fails: malformed input yields `false`.
    pub fn verify_well_formed(&self) -> bool {
        let Ok(pem) = std::str::from_utf8(&self.key_bytes) else {
            return false;
        };
        match self.key_type {
            KeyType::Ed25519 => VerifyingKey::from_public_key_pem(pem).is_ok(),
            KeyType::Rsa => match RsaPublicKey::from_public_key_pem(pem) {
                Ok(key) => {
                    key.size() * 8 == RSA_KEY_BITS
                        && *key.e() == BigUint::from(RSA_PUBLIC_EXPONENT)
                }
                Err(_) => false,
            },
        }
    }

    /// Verify an identity signature over a message.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CoreError> {
        let pem = std::str::from_utf8(&self.key_bytes)
            .map_err(|e| CoreError::MalformedKeyBytes(e.to_string()))?;
        match self.key_type {
            KeyType::Ed25519 => {
                let key = VerifyingKey::from_public_key_pem(pem)
                    .map_err(|e| CoreError::MalformedKeyBytes(e.to_string()))?;
                let sig = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| CoreError::InvalidSignature)?;
                key.verify(message, &sig)
                    .map_err(|_| CoreError::InvalidSignature)
            }
            KeyType::Rsa => {
                let key = RsaPublicKey::from_public_key_pem(pem)
                    .map_err(|e| CoreError::MalformedKeyBytes(e.to_string()))?;
                let verifier = pkcs1v15::VerifyingKey::<Sha256>::new(key);
                let sig = pkcs1v15::Signature::try_from(signature)
                    .map_err(|_| CoreError::InvalidSignature)?;
                verifier
                    .verify(message, &sig)
                    .map_err(|_| CoreError::InvalidSignature)
            }
        }
    }
}

impl fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityPublicKey({}, {})", self.key_type, self.fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_parsing() {
        assert_eq!("ed25519".parse::<KeyType>().unwrap(), KeyType::Ed25519);
        assert_eq!("rsa".parse::<KeyType>().unwrap(), KeyType::Rsa);
        assert!(matches!(
            "secp256k1".parse::<KeyType>(),
            Err(CoreError::UnsupportedKeyType(t)) if t == "secp256k1"
        ));
    }

    #[test]
    fn test_ed25519_identity_sign_verify() {
        let kp = IdentityKeyPair::generate(KeyType::Ed25519).unwrap();
        let sig = kp.sign(b"register me");
        kp.public_key().verify(b"register me", &sig).unwrap();
        assert!(kp.public_key().verify(b"register you", &sig).is_err());
        assert!(kp.public_key().verify_well_formed());
    }

    #[test]
    fn test_rsa_identity_sign_verify() {
        let kp = IdentityKeyPair::generate(KeyType::Rsa).unwrap();
        let pk = kp.public_key();
        assert!(pk.verify_well_formed());
        let sig = kp.sign(b"hello");
        assert_eq!(sig.len(), RSA_KEY_BITS / 8);
        pk.verify(b"hello", &sig).unwrap();
        assert!(pk.verify(b"hellO", &sig).is_err());
    }

    #[test]
    fn test_fingerprint_is_over_pem_bytes() {
        let kp = IdentityKeyPair::ed25519_from_seed(&[1u8; 32]).unwrap();
        assert_eq!(kp.fingerprint(), &fingerprint(&kp.public_key().key_bytes));
        assert_eq!(kp.fingerprint(), &IdentityKeyPair::ed25519_from_seed(&[1u8; 32]).unwrap().public_key().fingerprint);
    }

    #[test]
    fn test_verify_well_formed_rejects_garbage() {
        let junk = IdentityPublicKey::new(KeyType::Ed25519, b"not a key".to_vec());
        assert!(!junk.verify_well_formed());

        let binary = IdentityPublicKey::new(KeyType::Rsa, vec![0xff, 0xfe, 0x00]);
        assert!(!binary.verify_well_formed());

        // An ed25519 key declared as RSA is not well formed.
        let kp = IdentityKeyPair::ed25519_from_seed(&[9u8; 32]).unwrap();
        let mislabeled = IdentityPublicKey::new(KeyType::Rsa, kp.public_key().key_bytes.clone());
        assert!(!mislabeled.verify_well_formed());
    }

    #[test]
    fn test_verify_rejects_truncated_signature() {
        let kp = IdentityKeyPair::ed25519_from_seed(&[3u8; 32]).unwrap();
        let sig = kp.sign(b"msg");
        assert!(matches!(
            kp.public_key().verify(b"msg", &sig[..10]),
            Err(CoreError::InvalidSignature)
        ));
    }
}
