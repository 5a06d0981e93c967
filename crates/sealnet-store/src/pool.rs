//! A small fixed-size SQLite connection pool.
//!
//! Connections are checked out for one unit of work and returned when the
//! guard drops. Callers that cannot get a connection before the acquire
//! timeout receive [`StoreError::Unavailable`], which is retryable.

use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Fixed set of open connections shared by all store operations.
pub struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
    size: usize,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    /// Build a pool owning `connections`.
    pub fn new(connections: Vec<Connection>, acquire_timeout: Duration) -> Self {
        let size = connections.len();
        Self {
            idle: Mutex::new(connections),
            available: Condvar::new(),
            size,
            acquire_timeout,
        }
    }

    /// Check out a connection, waiting up to the acquire timeout.
    pub fn acquire(&self) -> Result<PooledConnection<'_>> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut idle = self.idle.lock();
        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }
            if self.available.wait_until(&mut idle, deadline).timed_out() && idle.is_empty() {
                tracing::warn!(
                    "connection pool exhausted after {:?} ({} connections)",
                    self.acquire_timeout,
                    self.size
                );
                return Err(StoreError::Unavailable(
                    "timed out waiting for a database connection".into(),
                ));
            }
        }
    }

    /// Total number of connections owned by the pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections currently checked in.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, conn: Connection) {
        self.idle.lock().push(conn);
        self.available.notify_one();
    }
}

/// A connection checked out of a [`ConnectionPool`].
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only taken in Drop.
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
