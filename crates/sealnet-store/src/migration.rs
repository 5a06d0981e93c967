//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::traits::now_millis;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!("applied schema migration v{}", version);
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Registered identity keys
        CREATE TABLE identities (
            fingerprint TEXT PRIMARY KEY,     -- pk:<16 hex>
            key_type TEXT NOT NULL,           -- ed25519 | rsa
            public_key TEXT NOT NULL,         -- PEM SubjectPublicKeyInfo
            created_at INTEGER NOT NULL       -- Unix ms
        );

        -- Mutable per-identity state; may exist without an identities row
        -- for recipients credited before registering
        CREATE TABLE identity_state (
            identity TEXT PRIMARY KEY,
            balance INTEGER NOT NULL DEFAULT 0,
            nonce INTEGER NOT NULL DEFAULT 0,      -- next expected nonce
            data_store TEXT NOT NULL DEFAULT '{}', -- JSON object
            updated_at INTEGER NOT NULL
        );

        -- Seal authorizations; a seal belongs to exactly one identity
        CREATE TABLE seal_authorizations (
            seal TEXT PRIMARY KEY,            -- seal:<16 hex>
            identity TEXT NOT NULL,
            public_key TEXT NOT NULL,         -- PEM SubjectPublicKeyInfo
            version INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            deactivated_at INTEGER
        );

        -- Accepted transactions
        CREATE TABLE transactions (
            tx_id TEXT PRIMARY KEY,           -- tx:<64 hex>
            identity TEXT NOT NULL,
            seal TEXT NOT NULL,
            tx_type TEXT NOT NULL,
            nonce INTEGER NOT NULL,
            body TEXT NOT NULL,               -- full signed transaction JSON
            status TEXT NOT NULL,             -- pending | confirmed | rejected
            created_at INTEGER NOT NULL,
            confirmed_at INTEGER
        );

        -- Indexes for common queries
        CREATE INDEX idx_seals_identity ON seal_authorizations(identity, is_active);
        CREATE INDEX idx_transactions_identity ON transactions(identity);
        CREATE INDEX idx_transactions_status ON transactions(status);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "identities",
            "identity_state",
            "seal_authorizations",
            "transactions",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
