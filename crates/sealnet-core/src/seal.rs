//! Seals: rotatable ed25519 signing keys delegated by an identity.
//!
//! Every transaction is signed by a seal rather than by the identity key. A
//! seal carries a version that starts at 1 and grows by one on each rotation,
//! and an `is_active` flag that rotation clears on the outgoing seal.

use ed25519_dalek::{Signer, SigningKey};
use std::fmt;

use crate::crypto::{SealPublicKey, SealSignature, Sha256Hash};
use crate::error::CoreError;
use crate::types::SealFingerprint;

/// Length of a raw seal private key.
pub const SEAL_KEY_LEN: usize = 32;

/// A seal key pair with its rotation metadata.
#[derive(Clone)]
pub struct Seal {
    signing_key: SigningKey,
    version: u32,
    is_active: bool,
}

impl Seal {
    /// Generate a fresh random seal at version 1.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self::with_key(SigningKey::generate(&mut rng), 1)
    }

    /// Deterministic seal from a seed.
    ///
    /// Seeds shorter than 32 bytes are first replaced by their SHA-256 digest;
    /// seeds longer than 32 bytes are rejected.
    pub fn from_seed(seed: &[u8]) -> Result<Self, CoreError> {
        let key_bytes: [u8; SEAL_KEY_LEN] = match seed.len() {
            n if n < SEAL_KEY_LEN => Sha256Hash::hash(seed).0,
            SEAL_KEY_LEN => seed
                .try_into()
                .map_err(|_| CoreError::MalformedKeyBytes("seed".into()))?,
            n => {
                return Err(CoreError::MalformedKeyBytes(format!(
                    "seal seed must be at most {SEAL_KEY_LEN} bytes, got {n}"
                )))
            }
        };
        Ok(Self::with_key(SigningKey::from_bytes(&key_bytes), 1))
    }

    /// Rebuild an active seal from exported raw private key bytes.
    pub fn import_private(bytes: &[u8], version: u32) -> Result<Self, CoreError> {
        let key_bytes: [u8; SEAL_KEY_LEN] = bytes.try_into().map_err(|_| {
            CoreError::MalformedKeyBytes(format!(
                "seal private key must be {SEAL_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::with_key(SigningKey::from_bytes(&key_bytes), version))
    }

    fn with_key(signing_key: SigningKey, version: u32) -> Self {
        Self {
            signing_key,
            version,
            is_active: true,
        }
    }

    /// Raw 32-byte private key material.
    pub fn export_private(&self) -> [u8; SEAL_KEY_LEN] {
        self.signing_key.to_bytes()
    }

    pub fn public_key(&self) -> SealPublicKey {
        SealPublicKey::from_verifying_key(self.signing_key.verifying_key())
    }

    /// PEM SubjectPublicKeyInfo of the seal public key.
    pub fn public_key_pem(&self) -> Result<String, CoreError> {
        self.public_key().to_pem()
    }

    pub fn fingerprint(&self) -> SealFingerprint {
        self.public_key().fingerprint()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> SealSignature {
        SealSignature(self.signing_key.sign(message).to_bytes())
    }

    /// Replace this seal with a freshly generated successor.
    ///
    /// Returns the outgoing seal marked inactive and the new seal at
    /// `version + 1`.
    pub fn rotate(self) -> (Seal, Seal) {
        let next = Self::with_key(
            SigningKey::generate(&mut rand::thread_rng()),
            self.version + 1,
        );
        let retired = Seal {
            is_active: false,
            ..self
        };
        (retired, next)
    }
}

impl fmt::Debug for Seal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Seal({}, v{}, {})",
            self.fingerprint(),
            self.version,
            if self.is_active { "active" } else { "retired" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_seed_is_deterministic() {
        let a = Seal::from_seed(&[0x42; 32]).unwrap();
        let b = Seal::from_seed(&[0x42; 32]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.version(), 1);
        assert!(a.is_active());
    }

    #[test]
    fn test_short_seed_is_hashed() {
        let short = Seal::from_seed(b"short seed").unwrap();
        let hashed = Seal::from_seed(&Sha256Hash::hash(b"short seed").0).unwrap();
        assert_eq!(short.fingerprint(), hashed.fingerprint());
    }

    #[test]
    fn test_long_seed_rejected() {
        assert!(matches!(
            Seal::from_seed(&[0u8; 33]),
            Err(CoreError::MalformedKeyBytes(_))
        ));
    }

    #[test]
    fn test_export_import() {
        let seal = Seal::generate();
        let restored = Seal::import_private(&seal.export_private(), 3).unwrap();
        assert_eq!(restored.fingerprint(), seal.fingerprint());
        assert_eq!(restored.version(), 3);
        assert!(Seal::import_private(&[1u8; 31], 1).is_err());
    }

    #[test]
    fn test_rotate() {
        let seal = Seal::generate();
        let old_fp = seal.fingerprint();
        let (old, new) = seal.rotate();
        assert!(!old.is_active());
        assert_eq!(old.fingerprint(), old_fp);
        assert!(new.is_active());
        assert_eq!(new.version(), old.version() + 1);
        assert_ne!(new.fingerprint(), old_fp);
    }

    #[test]
    fn test_sign_verify() {
        let seal = Seal::generate();
        let sig = seal.sign(b"payload");
        seal.public_key().verify(b"payload", &sig).unwrap();
        let other = Seal::generate();
        assert!(other.public_key().verify(b"payload", &sig).is_err());
    }

    #[test]
    fn test_pem_parses_back_to_same_fingerprint() {
        let seal = Seal::from_seed(&[7u8; 32]).unwrap();
        let pem = seal.public_key_pem().unwrap();
        assert_eq!(SealPublicKey::from_pem(&pem).unwrap().fingerprint(), seal.fingerprint());
    }
}
