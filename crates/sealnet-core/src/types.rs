//! Strong type definitions for Sealnet.
//!
//! All identifiers are newtypes to prevent misuse at compile time. Fingerprints
//! are carried as their textual form (`pk:…`, `seal:…`) because that is what
//! gets signed, stored and shown to users.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::Sha256Hash;
use crate::error::CoreError;

/// Number of hex characters kept from a digest when forming a fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Prefix of identity fingerprints.
pub const IDENTITY_PREFIX: &str = "pk:";

/// Prefix of seal fingerprints.
pub const SEAL_PREFIX: &str = "seal:";

/// Prefix of transaction ids.
pub const TRANSACTION_PREFIX: &str = "tx:";

fn check_fingerprint(s: &str, prefix: &str) -> Result<(), CoreError> {
    let digest = s
        .strip_prefix(prefix)
        .ok_or_else(|| CoreError::InvalidFingerprint(format!("missing {prefix} prefix: {s}")))?;
    let valid = digest.len() == FINGERPRINT_HEX_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !valid {
        return Err(CoreError::InvalidFingerprint(s.to_string()));
    }
    Ok(())
}

/// Fingerprint of an identity public key: `pk:` + 16 lowercase hex characters.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityFingerprint(String);

impl IdentityFingerprint {
    /// Derive the fingerprint of a serialized (PEM) identity public key.
    pub fn derive(public_key_bytes: &[u8]) -> Self {
        let digest = Sha256Hash::hash(public_key_bytes).to_hex();
        Self(format!("{IDENTITY_PREFIX}{}", &digest[..FINGERPRINT_HEX_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IdentityFingerprint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_fingerprint(s, IDENTITY_PREFIX)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for IdentityFingerprint {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        check_fingerprint(&s, IDENTITY_PREFIX)?;
        Ok(Self(s))
    }
}

impl From<IdentityFingerprint> for String {
    fn from(fp: IdentityFingerprint) -> Self {
        fp.0
    }
}

impl fmt::Debug for IdentityFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl fmt::Display for IdentityFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint of a seal: `seal:` + 16 hex characters of a double SHA-256
/// over the raw 32-byte public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SealFingerprint(String);

impl SealFingerprint {
    /// Derive the fingerprint of a raw ed25519 seal public key.
    pub fn derive(raw_public_key: &[u8; 32]) -> Self {
        let inner = Sha256Hash::hash(raw_public_key);
        let digest = Sha256Hash::hash(inner.as_bytes()).to_hex();
        Self(format!("{SEAL_PREFIX}{}", &digest[..FINGERPRINT_HEX_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SealFingerprint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_fingerprint(s, SEAL_PREFIX)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for SealFingerprint {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        check_fingerprint(&s, SEAL_PREFIX)?;
        Ok(Self(s))
    }
}

impl From<SealFingerprint> for String {
    fn from(fp: SealFingerprint) -> Self {
        fp.0
    }
}

impl fmt::Debug for SealFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seal({})", self.0)
    }
}

impl fmt::Display for SealFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 32-byte transaction identifier, SHA-256 of the canonical signing bytes.
///
/// Displays as `tx:` followed by the full lowercase hex digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(pub [u8; 32]);

impl TransactionId {
    /// Create a new TransactionId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string (without the `tx:` prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a bare hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TRANSACTION_PREFIX}{}", self.to_hex())
    }
}

impl FromStr for TransactionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digest = s
            .strip_prefix(TRANSACTION_PREFIX)
            .ok_or_else(|| CoreError::DecodingError(format!("missing tx: prefix: {s}")))?;
        Self::from_hex(digest).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

impl TryFrom<String> for TransactionId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.to_string()
    }
}

impl AsRef<[u8]> for TransactionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for TransactionId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}
