//! SQLite implementation of the AuthorityStore trait.
//!
//! This is the primary storage backend for Sealnet. It uses rusqlite with
//! bundled SQLite behind a [`ConnectionPool`]; every operation checks out one
//! connection for its unit of work. Commits run inside an IMMEDIATE
//! transaction so the nonce check and the writes that depend on it cannot
//! interleave with another writer.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};

use sealnet_core::{
    Effect, IdentityFingerprint, IdentityState, KeyType, SealFingerprint, StateTransition,
    Transaction, TransactionId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::traits::{
    now_millis, AuthorityStore, CommitOutcome, DatabaseStats, IdentityRecord,
    RegistrationOutcome, SealRecord, StoredTransaction, TransactionStatus,
};

/// Configuration for [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Number of pooled connections for file-backed databases.
    pub pool_size: usize,
    /// How long SQLite retries a locked database before failing.
    pub busy_timeout: Duration,
    /// How long an operation waits for a free connection.
    pub acquire_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// SQLite-based store implementation.
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    /// Open a SQLite database at the given path with default settings.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &SqliteConfig::default())
    }

    /// Open a SQLite database at the given path.
    pub fn open_with_config(path: impl AsRef<Path>, config: &SqliteConfig) -> Result<Self> {
        let path = path.as_ref();
        let size = config.pool_size.max(1);
        let mut connections = Vec::with_capacity(size);
        for i in 0..size {
            let mut conn = Connection::open(path)?;
            configure(&conn, config.busy_timeout)?;
            if i == 0 {
                let mode: String =
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                tracing::debug!("sqlite journal mode: {}", mode);
                migration::migrate(&mut conn)?;
            }
            connections.push(conn);
        }
        tracing::debug!("opened sqlite store at {} ({} connections)", path.display(), size);
        Ok(Self {
            pool: ConnectionPool::new(connections, config.acquire_timeout),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// In-memory databases are private to their connection, so the pool holds
    /// a single connection. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let config = SqliteConfig::default();
        let mut conn = Connection::open_in_memory()?;
        configure(&conn, config.busy_timeout)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            pool: ConnectionPool::new(vec![conn], config.acquire_timeout),
        })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Execute an operation on a pooled connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.pool.acquire()?;
        f(&conn)
    }

    /// Execute an operation that needs mutable access (transactions).
    fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PooledConnection<'_>) -> Result<T>,
    {
        let mut conn = self.pool.acquire()?;
        f(&mut conn)
    }
}

fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Column conversions
// ─────────────────────────────────────────────────────────────────────────────

fn to_sql_int(n: u64) -> Result<i64> {
    i64::try_from(n).map_err(|_| StoreError::InvalidData(format!("{n} exceeds integer range")))
}

fn from_sql_int(n: i64) -> Result<u64> {
    u64::try_from(n).map_err(|_| StoreError::InvalidData(format!("negative value {n}")))
}

fn parse_identity(s: &str) -> Result<IdentityFingerprint> {
    s.parse()
        .map_err(|e| StoreError::InvalidData(format!("identity fingerprint: {e}")))
}

fn parse_seal(s: &str) -> Result<SealFingerprint> {
    s.parse()
        .map_err(|e| StoreError::InvalidData(format!("seal fingerprint: {e}")))
}

struct SealRow {
    seal: String,
    identity: String,
    public_key: String,
    version: u32,
    is_active: bool,
    created_at: i64,
    deactivated_at: Option<i64>,
}

const SEAL_COLUMNS: &str =
    "seal, identity, public_key, version, is_active, created_at, deactivated_at";

fn read_seal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SealRow> {
    Ok(SealRow {
        seal: row.get(0)?,
        identity: row.get(1)?,
        public_key: row.get(2)?,
        version: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        deactivated_at: row.get(6)?,
    })
}

impl SealRow {
    fn into_record(self) -> Result<SealRecord> {
        Ok(SealRecord {
            identity: parse_identity(&self.identity)?,
            fingerprint: parse_seal(&self.seal)?,
            public_key_pem: self.public_key,
            version: self.version,
            is_active: self.is_active,
            created_at: self.created_at,
            deactivated_at: self.deactivated_at,
        })
    }
}

struct TransactionRow {
    body: String,
    status: String,
    created_at: i64,
    confirmed_at: Option<i64>,
}

const TRANSACTION_COLUMNS: &str = "body, status, created_at, confirmed_at";

fn read_transaction_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransactionRow> {
    Ok(TransactionRow {
        body: row.get(0)?,
        status: row.get(1)?,
        created_at: row.get(2)?,
        confirmed_at: row.get(3)?,
    })
}

impl TransactionRow {
    fn into_stored(self) -> Result<StoredTransaction> {
        Ok(StoredTransaction {
            transaction: Transaction::from_json(&self.body)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            status: self.status.parse()?,
            created_at: self.created_at,
            confirmed_at: self.confirmed_at,
        })
    }
}

fn query_seals(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<SealRecord>> {
    let rows = conn
        .prepare(sql)?
        .query_map(params, read_seal_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(SealRow::into_record).collect()
}

fn query_transactions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<StoredTransaction>> {
    let rows = conn
        .prepare(sql)?
        .query_map(params, read_transaction_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(TransactionRow::into_stored).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Statements shared by direct calls and commits
// ─────────────────────────────────────────────────────────────────────────────

fn insert_transaction(conn: &Connection, tx: &Transaction, status: TransactionStatus) -> Result<bool> {
    let now = now_millis();
    let confirmed_at = (status == TransactionStatus::Confirmed).then_some(now);
    let body = tx.to_json().map_err(|e| StoreError::Serialization(e.to_string()))?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO transactions (
            tx_id, identity, seal, tx_type, nonce, body, status, created_at, confirmed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            tx.id().to_string(),
            tx.identity_fingerprint.as_str(),
            tx.seal_fingerprint.as_str(),
            tx.tx_type().as_str(),
            to_sql_int(tx.nonce)?,
            body,
            status.as_str(),
            now,
            confirmed_at,
        ],
    )?;
    Ok(inserted == 1)
}

fn insert_seal(
    conn: &Connection,
    identity: &IdentityFingerprint,
    seal: &SealFingerprint,
    public_key_pem: &str,
    version: u32,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO seal_authorizations (
            seal, identity, public_key, version, is_active, created_at
        ) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![seal.as_str(), identity.as_str(), public_key_pem, version, now_millis()],
    )?;
    Ok(inserted == 1)
}

fn deactivate(conn: &Connection, identity: &IdentityFingerprint, seal: &SealFingerprint) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE seal_authorizations SET is_active = 0, deactivated_at = ?3
         WHERE seal = ?1 AND identity = ?2 AND is_active = 1",
        params![seal.as_str(), identity.as_str(), now_millis()],
    )?;
    Ok(updated == 1)
}

fn read_nonce(conn: &Connection, identity: &IdentityFingerprint) -> Result<Option<u64>> {
    conn.query_row(
        "SELECT nonce FROM identity_state WHERE identity = ?1",
        params![identity.as_str()],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .map(from_sql_int)
    .transpose()
}

fn read_balance(conn: &Connection, identity: &IdentityFingerprint) -> Result<Option<u64>> {
    conn.query_row(
        "SELECT balance FROM identity_state WHERE identity = ?1",
        params![identity.as_str()],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .map(from_sql_int)
    .transpose()
}

fn write_balance(conn: &Connection, identity: &IdentityFingerprint, balance: u64) -> Result<()> {
    conn.execute(
        "UPDATE identity_state SET balance = ?2, updated_at = ?3 WHERE identity = ?1",
        params![identity.as_str(), to_sql_int(balance)?, now_millis()],
    )?;
    Ok(())
}

fn upsert_identity(conn: &Connection, record: &IdentityRecord, initial_balance: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO identities (fingerprint, key_type, public_key, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(fingerprint) DO UPDATE SET
            key_type = excluded.key_type,
            public_key = excluded.public_key",
        params![
            record.fingerprint.as_str(),
            record.key_type.as_str(),
            record.public_key_pem,
            record.created_at,
        ],
    )?;
    ensure_state(conn, &record.fingerprint, initial_balance)
}

fn exists(conn: &Connection, sql: &str, key: &str) -> Result<bool> {
    Ok(conn
        .query_row(sql, params![key], |_| Ok(()))
        .optional()?
        .is_some())
}

fn ensure_state(conn: &Connection, identity: &IdentityFingerprint, balance: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO identity_state (identity, balance, nonce, data_store, updated_at)
         VALUES (?1, ?2, 0, '{}', ?3)
         ON CONFLICT(identity) DO NOTHING",
        params![identity.as_str(), to_sql_int(balance)?, now_millis()],
    )?;
    Ok(())
}

/// Apply one effect inside an open transaction.
fn apply_effect(conn: &Connection, effect: &Effect) -> Result<Option<CommitOutcome>> {
    match effect {
        Effect::Debit { identity, amount } => {
            let balance = read_balance(conn, identity)?
                .ok_or_else(|| StoreError::NotFound(identity.to_string()))?;
            match balance.checked_sub(*amount) {
                Some(rest) => write_balance(conn, identity, rest)?,
                None => {
                    return Ok(Some(CommitOutcome::InsufficientFunds {
                        balance,
                        amount: *amount,
                    }))
                }
            }
        }
        Effect::Credit { identity, amount } => {
            ensure_state(conn, identity, 0)?;
            let balance = read_balance(conn, identity)?.unwrap_or(0);
            let updated = balance
                .checked_add(*amount)
                .ok_or_else(|| StoreError::InvalidData("balance overflow".into()))?;
            write_balance(conn, identity, updated)?;
        }
        Effect::DeactivateSeal { identity, seal } => {
            if !deactivate(conn, identity, seal)? {
                return Ok(Some(CommitOutcome::SealConflict));
            }
        }
        Effect::AuthorizeSeal {
            identity,
            seal,
            public_key_pem,
            version,
        } => {
            if !insert_seal(conn, identity, seal, public_key_pem, *version)? {
                return Ok(Some(CommitOutcome::SealConflict));
            }
        }
        Effect::MergeData { identity, entries } => {
            let raw: String = conn
                .query_row(
                    "SELECT data_store FROM identity_state WHERE identity = ?1",
                    params![identity.as_str()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(identity.to_string()))?;
            let mut data: Map<String, Value> = serde_json::from_str(&raw)?;
            for (k, v) in entries {
                data.insert(k.clone(), v.clone());
            }
            conn.execute(
                "UPDATE identity_state SET data_store = ?2, updated_at = ?3 WHERE identity = ?1",
                params![identity.as_str(), serde_json::to_string(&data)?, now_millis()],
            )?;
        }
    }
    Ok(None)
}

impl AuthorityStore for SqliteStore {
    fn save_identity(&self, record: &IdentityRecord, initial_balance: u64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            upsert_identity(&tx, record, initial_balance)?;
            tx.commit()?;
            Ok(())
        })
    }

    fn register(
        &self,
        record: &IdentityRecord,
        initial_balance: u64,
        seal: &SealFingerprint,
        seal_public_key_pem: &str,
        seal_version: u32,
    ) -> Result<RegistrationOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if exists(
                &tx,
                "SELECT 1 FROM identities WHERE fingerprint = ?1",
                record.fingerprint.as_str(),
            )? {
                return Ok(RegistrationOutcome::IdentityExists);
            }
            upsert_identity(&tx, record, initial_balance)?;
            if !insert_seal(&tx, &record.fingerprint, seal, seal_public_key_pem, seal_version)? {
                // Dropping `tx` rolls back the identity row.
                return Ok(RegistrationOutcome::SealInUse);
            }
            tx.commit()?;
            Ok(RegistrationOutcome::Registered)
        })
    }

    fn get_identity(&self, identity: &IdentityFingerprint) -> Result<Option<IdentityRecord>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT key_type, public_key, created_at FROM identities WHERE fingerprint = ?1",
                    params![identity.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;
            row.map(|(key_type, public_key_pem, created_at)| {
                Ok(IdentityRecord {
                    fingerprint: identity.clone(),
                    key_type: key_type
                        .parse::<KeyType>()
                        .map_err(|e| StoreError::InvalidData(e.to_string()))?,
                    public_key_pem,
                    created_at,
                })
            })
            .transpose()
        })
    }

    fn get_identity_state(&self, identity: &IdentityFingerprint) -> Result<Option<IdentityState>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT balance, nonce, data_store FROM identity_state WHERE identity = ?1",
                    params![identity.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;
            let Some((balance, nonce, data)) = row else {
                return Ok(None);
            };

            let mut state = IdentityState::new(identity.clone(), from_sql_int(balance)?);
            state.nonce = from_sql_int(nonce)?;
            state.data_store = serde_json::from_str(&data)?;
            for seal in query_seals(
                conn,
                &format!("SELECT {SEAL_COLUMNS} FROM seal_authorizations WHERE identity = ?1"),
                params![identity.as_str()],
            )? {
                state.all_seals.insert(seal.fingerprint.clone());
                if seal.is_active {
                    state.active_seals.insert(seal.fingerprint);
                }
            }
            Ok(Some(state))
        })
    }

    fn authorize_seal(
        &self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
        public_key_pem: &str,
        version: u32,
    ) -> Result<bool> {
        self.with_conn(|conn| insert_seal(conn, identity, seal, public_key_pem, version))
    }

    fn deactivate_seal(
        &self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
    ) -> Result<bool> {
        self.with_conn(|conn| deactivate(conn, identity, seal))
    }

    fn get_seal(&self, seal: &SealFingerprint) -> Result<Option<SealRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SEAL_COLUMNS} FROM seal_authorizations WHERE seal = ?1"),
                params![seal.as_str()],
                read_seal_row,
            )
            .optional()?
            .map(SealRow::into_record)
            .transpose()
        })
    }

    fn get_authorized_seal_public_key(
        &self,
        identity: &IdentityFingerprint,
        seal: &SealFingerprint,
    ) -> Result<Option<String>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT public_key FROM seal_authorizations
                     WHERE seal = ?1 AND identity = ?2 AND is_active = 1",
                    params![seal.as_str(), identity.as_str()],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn get_active_seals(&self, identity: &IdentityFingerprint) -> Result<Vec<SealRecord>> {
        self.with_conn(|conn| {
            query_seals(
                conn,
                &format!(
                    "SELECT {SEAL_COLUMNS} FROM seal_authorizations
                     WHERE identity = ?1 AND is_active = 1 ORDER BY version"
                ),
                params![identity.as_str()],
            )
        })
    }

    fn get_nonce(&self, identity: &IdentityFingerprint) -> Result<Option<u64>> {
        self.with_conn(|conn| read_nonce(conn, identity))
    }

    fn increment_nonce(&self, identity: &IdentityFingerprint) -> Result<u64> {
        self.with_conn(|conn| {
            let nonce: Option<i64> = conn
                .query_row(
                    "UPDATE identity_state SET nonce = nonce + 1, updated_at = ?2
                     WHERE identity = ?1 RETURNING nonce",
                    params![identity.as_str(), now_millis()],
                    |row| row.get(0),
                )
                .optional()?;
            nonce
                .map(from_sql_int)
                .transpose()?
                .ok_or_else(|| StoreError::NotFound(identity.to_string()))
        })
    }

    fn save_transaction(&self, tx: &Transaction, status: TransactionStatus) -> Result<bool> {
        self.with_conn(|conn| insert_transaction(conn, tx, status))
    }

    fn get_transaction(&self, id: &TransactionId) -> Result<Option<StoredTransaction>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE tx_id = ?1"),
                params![id.to_string()],
                read_transaction_row,
            )
            .optional()?
            .map(TransactionRow::into_stored)
            .transpose()
        })
    }

    fn set_transaction_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let confirmed_at = (status == TransactionStatus::Confirmed).then(now_millis);
            let updated = conn.execute(
                "UPDATE transactions SET status = ?2, confirmed_at = ?3 WHERE tx_id = ?1",
                params![id.to_string(), status.as_str(), confirmed_at],
            )?;
            Ok(updated == 1)
        })
    }

    fn get_identity_transactions(
        &self,
        identity: &IdentityFingerprint,
        limit: usize,
    ) -> Result<Vec<StoredTransaction>> {
        let limit = to_sql_int(limit as u64)?;
        self.with_conn(|conn| {
            query_transactions(
                conn,
                &format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transactions
                     WHERE identity = ?1 ORDER BY rowid DESC LIMIT ?2"
                ),
                params![identity.as_str(), limit],
            )
        })
    }

    fn get_pending_transactions(&self, limit: usize) -> Result<Vec<StoredTransaction>> {
        let limit = to_sql_int(limit as u64)?;
        self.with_conn(|conn| {
            query_transactions(
                conn,
                &format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transactions
                     WHERE status = 'pending' ORDER BY rowid ASC LIMIT ?1"
                ),
                params![limit],
            )
        })
    }

    fn get_database_stats(&self) -> Result<DatabaseStats> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64> {
                from_sql_int(conn.query_row(sql, [], |row| row.get::<_, i64>(0))?)
            };
            let mut stats = DatabaseStats {
                identities: count("SELECT COUNT(*) FROM identities")?,
                active_seals: count("SELECT COUNT(*) FROM seal_authorizations WHERE is_active = 1")?,
                ..DatabaseStats::default()
            };

            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM transactions GROUP BY status")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (status, n) in rows {
                let n = from_sql_int(n)?;
                match status.parse::<TransactionStatus>()? {
                    TransactionStatus::Pending => stats.pending_transactions = n,
                    TransactionStatus::Confirmed => stats.confirmed_transactions = n,
                    TransactionStatus::Rejected => stats.rejected_transactions = n,
                }
            }
            Ok(stats)
        })
    }

    fn commit(&self, transition: &StateTransition) -> Result<CommitOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let identity = transition.identity();

            let current = read_nonce(&tx, identity)?;
            if current != Some(transition.expected_nonce) {
                return Ok(CommitOutcome::NonceConflict { current });
            }

            for effect in &transition.effects {
                if let Some(outcome) = apply_effect(&tx, effect)? {
                    // Dropping `tx` rolls back everything applied so far.
                    return Ok(outcome);
                }
            }

            tx.execute(
                "UPDATE identity_state SET nonce = nonce + 1, updated_at = ?2 WHERE identity = ?1",
                params![identity.as_str(), now_millis()],
            )?;
            insert_transaction(&tx, &transition.transaction, TransactionStatus::Pending)?;

            tx.commit()?;
            Ok(CommitOutcome::Committed)
        })
    }
}
