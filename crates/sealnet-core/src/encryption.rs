//! Payload encryption keyed by a seal.
//!
//! The symmetric key is derived from the seal's raw private bytes with
//! HKDF-SHA256 under a fixed salt and info string, and payloads are sealed with
//! AES-256-GCM. Ciphertext blobs are laid out as `nonce(12) ‖ ciphertext ‖ tag(16)`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::error::CoreError;

/// HKDF salt for payload keys.
pub const KDF_SALT: &[u8] = b"sealnet-payload-salt";

/// HKDF info string for payload keys.
pub const KDF_INFO: &[u8] = b"payload-encryption-key";

/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// A 256-bit payload encryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct PayloadKey([u8; 32]);

impl PayloadKey {
    /// Derive the payload key for a seal's raw private key bytes.
    pub fn derive(seal_private_key: &[u8]) -> Result<Self, CoreError> {
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), seal_private_key);
        let mut okm = [0u8; 32];
        hk.expand(KDF_INFO, &mut okm)
            .map_err(|_| CoreError::EncryptionFailed)?;
        Ok(Self(okm))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CoreError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CoreError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a `nonce ‖ ciphertext ‖ tag` blob.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CoreError> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CoreError::DecryptionError);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CoreError::DecryptionError)
    }
}

impl std::fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadKey(..)")
    }
}

/// Derive the payload key for a seal's raw private key bytes.
pub fn derive_key(seal_private_key: &[u8]) -> Result<PayloadKey, CoreError> {
    PayloadKey::derive(seal_private_key)
}

/// Encrypt `plaintext` under `key`.
pub fn encrypt(plaintext: &[u8], key: &PayloadKey) -> Result<Vec<u8>, CoreError> {
    key.encrypt(plaintext)
}

/// Decrypt `blob` under `key`.
pub fn decrypt(blob: &[u8], key: &PayloadKey) -> Result<Vec<u8>, CoreError> {
    key.decrypt(blob)
}
