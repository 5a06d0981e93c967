//! Ledger configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use sealnet_store::SqliteConfig;

use crate::mempool::MempoolConfig;

/// Configuration for a [`Ledger`](crate::Ledger).
///
/// Every field has a default, so a host application can embed this in its own
/// config file and set only what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub mempool: MempoolConfig,
    /// Upper bound on how many transactions a pending listing returns.
    pub pending_limit: usize,
    /// Connections kept open by a file-backed SQLite store.
    pub store_pool_size: usize,
    /// How long SQLite retries a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let store = SqliteConfig::default();
        Self {
            mempool: MempoolConfig::default(),
            pending_limit: 100,
            store_pool_size: store.pool_size,
            busy_timeout_ms: store.busy_timeout.as_millis() as u64,
        }
    }
}

impl LedgerConfig {
    /// Store settings derived from this configuration.
    pub fn sqlite(&self) -> SqliteConfig {
        SqliteConfig {
            pool_size: self.store_pool_size.max(1),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..SqliteConfig::default()
        }
    }
}
