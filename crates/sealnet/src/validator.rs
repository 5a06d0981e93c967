//! Transaction validation against ledger state.
//!
//! A transaction passes through four gates in order: seal authorization,
//! signature, nonce, then the type-specific effects. The first gate that fails
//! rejects the transaction. Validation never writes; it produces a
//! [`StateTransition`] which the store commits atomically, re-checking the
//! nonce so that two racing submissions for one identity cannot both land.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use sealnet_core::transaction::{
    FIELD_AMOUNT, FIELD_NEW_SEAL_FINGERPRINT, FIELD_NEW_SEAL_PUBLIC_KEY, FIELD_RECIPIENT,
};
use sealnet_core::{
    Effect, IdentityFingerprint, PayloadBody, SealFingerprint, SealPublicKey, StateTransition,
    Transaction, TransactionType, ValidationError,
};
use sealnet_store::{AuthorityStore, CommitOutcome};

use crate::error::{LedgerError, Result};

/// Validates transactions and commits their effects to a store.
pub struct Validator<S: AuthorityStore> {
    store: Arc<S>,
}

impl<S: AuthorityStore> Validator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run every gate and return the resulting transition without writing.
    pub fn evaluate(&self, tx: &Transaction) -> Result<StateTransition> {
        let identity = &tx.identity_fingerprint;

        // 1. Seal must be active for this identity
        let pem = self
            .store
            .get_authorized_seal_public_key(identity, &tx.seal_fingerprint)?
            .ok_or_else(|| reject(tx, ValidationError::SealNotAuthorized))?;

        // 2. Signature over the canonical bytes
        let verified = SealPublicKey::from_pem(&pem)
            .and_then(|key| key.verify(&tx.canonical_bytes(), &tx.signature));
        if verified.is_err() {
            return Err(reject(tx, ValidationError::InvalidSignature));
        }

        // 3. Exact nonce
        let expected_nonce = match self.store.get_nonce(identity)? {
            Some(n) if n == tx.nonce => n,
            expected => {
                return Err(reject(
                    tx,
                    ValidationError::NonceMismatch {
                        expected,
                        got: tx.nonce,
                    },
                ))
            }
        };

        // 4. Type-specific effects
        let effects = match tx.tx_type() {
            TransactionType::TokenTransfer => self.transfer_effects(tx),
            TransactionType::SealRotation => self.rotation_effects(tx),
            TransactionType::Data => Ok(data_effects(tx)),
            other => Err(ValidationError::UnsupportedTransactionType(other).into()),
        }
        .map_err(|e| match e {
            LedgerError::Rejected(v) => reject(tx, v),
            other => other,
        })?;

        Ok(StateTransition {
            transaction: tx.clone(),
            expected_nonce,
            effects,
        })
    }

    /// Validate and atomically commit. On success the transaction is stored
    /// as pending and the identity's nonce has advanced by one.
    pub fn process(&self, tx: &Transaction) -> Result<StateTransition> {
        let transition = self.evaluate(tx)?;

        let rejection = match self.store.commit(&transition)? {
            CommitOutcome::Committed => {
                info!(
                    tx_id = %transition.transaction_id(),
                    identity = %tx.identity_fingerprint,
                    tx_type = %tx.tx_type(),
                    nonce = tx.nonce,
                    "transaction accepted"
                );
                return Ok(transition);
            }
            CommitOutcome::NonceConflict { current } => ValidationError::NonceMismatch {
                expected: current,
                got: tx.nonce,
            },
            CommitOutcome::InsufficientFunds { balance, amount } => {
                ValidationError::InsufficientFunds { balance, amount }
            }
            CommitOutcome::SealConflict => {
                warn!(
                    identity = %tx.identity_fingerprint,
                    seal = %tx.seal_fingerprint,
                    "seal set changed between validation and commit"
                );
                if tx.tx_type() == TransactionType::SealRotation {
                    ValidationError::MalformedRotation("seal changed concurrently".into())
                } else {
                    ValidationError::SealNotAuthorized
                }
            }
        };
        Err(reject(tx, rejection))
    }

    fn transfer_effects(&self, tx: &Transaction) -> Result<Vec<Effect>> {
        let data = tx.payload.body.as_cleartext().ok_or_else(|| {
            ValidationError::MalformedTransfer("transfer payload must not be encrypted".into())
        })?;

        let amount = data
            .get(FIELD_AMOUNT)
            .and_then(Value::as_u64)
            .filter(|a| *a > 0)
            .ok_or(ValidationError::InvalidAmount)?;

        let recipient: IdentityFingerprint = data
            .get(FIELD_RECIPIENT)
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::MalformedTransfer("missing recipient".into()))?
            .parse()
            .map_err(|_| ValidationError::MalformedTransfer("invalid recipient fingerprint".into()))?;

        let balance = self
            .store
            .get_identity_state(&tx.identity_fingerprint)?
            .map(|s| s.balance)
            .unwrap_or(0);
        if balance < amount {
            return Err(ValidationError::InsufficientFunds { balance, amount }.into());
        }

        Ok(vec![
            Effect::Debit {
                identity: tx.identity_fingerprint.clone(),
                amount,
            },
            Effect::Credit {
                identity: recipient,
                amount,
            },
        ])
    }

    fn rotation_effects(&self, tx: &Transaction) -> Result<Vec<Effect>> {
        let data = tx
            .payload
            .body
            .as_cleartext()
            .ok_or_else(|| malformed_rotation("rotation payload must not be encrypted"))?;

        let new_fingerprint: SealFingerprint = string_field(data, FIELD_NEW_SEAL_FINGERPRINT)?
            .parse()
            .map_err(|_| malformed_rotation("invalid new seal fingerprint"))?;

        let encoded = string_field(data, FIELD_NEW_SEAL_PUBLIC_KEY)?;
        let pem_bytes = BASE64
            .decode(encoded)
            .map_err(|_| malformed_rotation("new seal key is not base64"))?;
        let pem = String::from_utf8(pem_bytes)
            .map_err(|_| malformed_rotation("new seal key is not utf-8"))?;
        let new_key =
            SealPublicKey::from_pem(&pem).map_err(|_| malformed_rotation("new seal key is not a PEM ed25519 key"))?;

        if new_key.fingerprint() != new_fingerprint {
            return Err(malformed_rotation("new seal fingerprint does not match its key").into());
        }
        if self.store.get_seal(&new_fingerprint)?.is_some() {
            return Err(malformed_rotation("new seal is already known").into());
        }

        let current = self
            .store
            .get_seal(&tx.seal_fingerprint)?
            .ok_or(ValidationError::SealNotAuthorized)?;

        Ok(vec![
            Effect::DeactivateSeal {
                identity: tx.identity_fingerprint.clone(),
                seal: tx.seal_fingerprint.clone(),
            },
            Effect::AuthorizeSeal {
                identity: tx.identity_fingerprint.clone(),
                seal: new_fingerprint,
                public_key_pem: pem,
                version: current.version + 1,
            },
        ])
    }
}

fn data_effects(tx: &Transaction) -> Vec<Effect> {
    match &tx.payload.body {
        PayloadBody::Cleartext(entries) if !entries.is_empty() => vec![Effect::MergeData {
            identity: tx.identity_fingerprint.clone(),
            entries: entries.clone(),
        }],
        _ => Vec::new(),
    }
}

fn string_field<'a>(data: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed_rotation(&format!("missing {field}")).into())
}

fn malformed_rotation(reason: &str) -> ValidationError {
    ValidationError::MalformedRotation(reason.to_string())
}

fn reject(tx: &Transaction, error: ValidationError) -> LedgerError {
    debug!(
        identity = %tx.identity_fingerprint,
        seal = %tx.seal_fingerprint,
        nonce = tx.nonce,
        gate = error.gate(),
        %error,
        "transaction rejected"
    );
    LedgerError::Rejected(error)
}
