//! Bounded connection pool over a libSQL database handle.
//!
//! Checkout is limited to `size + max_overflow` concurrent connections by a
//! semaphore, and waiting for a slot is always bounded by `timeout`. Returned
//! connections are kept idle (at most `size` of them) and reused most recent
//! first unless `use_lifo` is off. With `pre_ping` each idle connection is
//! probed with `SELECT 1` before reuse; dead ones are dropped and replaced.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tabula_config::DatabaseConfig;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::DatabaseError;

/// Pool sizing and behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Idle connections retained between checkouts.
    pub size: usize,
    /// Extra connections allowed under load, closed on return.
    pub max_overflow: usize,
    /// Upper bound on waiting for a free slot.
    pub timeout: Duration,
    /// Probe idle connections before handing them out.
    pub pre_ping: bool,
    /// Reuse the most recently returned connection first.
    pub use_lifo: bool,
    /// `PRAGMA` settings applied to every new connection.
    pub pragmas: Vec<(String, String)>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::from_config(&DatabaseConfig::default())
    }
}

impl PoolOptions {
    #[must_use]
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            size: config.pool_size,
            max_overflow: config.max_overflow,
            timeout: config.pool_timeout(),
            pre_ping: config.pool_pre_ping,
            use_lifo: config.pool_use_lifo,
            pragmas: config
                .connect_args
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub const fn max_connections(&self) -> usize {
        self.size + self.max_overflow
    }

    #[must_use]
    pub fn pragma(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pragmas.push((key.into(), value.into()));
        self
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub checked_out: usize,
    pub max_connections: usize,
}

pub struct ConnectionPool {
    db: libsql::Database,
    options: PoolOptions,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<libsql::Connection>>,
}

impl ConnectionPool {
    pub(crate) fn new(db: libsql::Database, options: PoolOptions) -> Self {
        let permits = Arc::new(Semaphore::new(options.max_connections()));
        Self {
            db,
            options,
            permits,
            idle: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub const fn options(&self) -> &PoolOptions {
        &self.options
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let max_connections = self.options.max_connections();
        PoolStatus {
            idle: self.lock_idle().len(),
            checked_out: max_connections - self.permits.available_permits(),
            max_connections,
        }
    }

    /// Check out a connection, waiting at most `timeout` for a free slot.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::PoolTimeout` when no slot frees up in time, or
    /// the libSQL error if a fresh connection cannot be opened.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection, DatabaseError> {
        let timeout = self.options.timeout;
        let permit = tokio::time::timeout(timeout, Arc::clone(&self.permits).acquire_owned())
            .await
            .map_err(|_| {
                tracing::warn!(?timeout, max = self.options.max_connections(), "connection pool exhausted");
                DatabaseError::PoolTimeout(timeout)
            })?
            .map_err(|e| DatabaseError::Other(e.into()))?;

        while let Some(conn) = self.pop_idle() {
            if !self.options.pre_ping || Self::ping(&conn).await {
                return Ok(PooledConnection::new(conn, Arc::clone(self), permit));
            }
            tracing::debug!("discarding dead pooled connection");
        }

        let conn = self.connect().await?;
        Ok(PooledConnection::new(conn, Arc::clone(self), permit))
    }

    async fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.db.connect()?;
        // Foreign keys are per-connection in SQLite
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        for (key, value) in &self.options.pragmas {
            // query, not execute: some pragmas report their new value as a row
            conn.query(&format!("PRAGMA {key} = {value}"), ()).await?;
        }
        Ok(conn)
    }

    async fn ping(conn: &libsql::Connection) -> bool {
        match conn.query("SELECT 1", ()).await {
            Ok(mut rows) => rows.next().await.is_ok(),
            Err(_) => false,
        }
    }

    fn pop_idle(&self) -> Option<libsql::Connection> {
        let mut idle = self.lock_idle();
        if self.options.use_lifo {
            idle.pop_back()
        } else {
            idle.pop_front()
        }
    }

    fn release(&self, conn: libsql::Connection) {
        let mut idle = self.lock_idle();
        if idle.len() < self.options.size {
            idle.push_back(conn);
        }
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, VecDeque<libsql::Connection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A checked-out connection. Returns to the pool on drop unless discarded.
pub struct PooledConnection {
    conn: libsql::Connection,
    pool: Arc<ConnectionPool>,
    discard: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    fn new(conn: libsql::Connection, pool: Arc<ConnectionPool>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            conn,
            pool,
            discard: false,
            _permit: permit,
        }
    }

    /// Close the connection on drop instead of returning it. Closing an
    /// `SQLite` connection rolls back whatever transaction it still holds.
    pub const fn discard(&mut self) {
        self.discard = true;
    }
}

impl Deref for PooledConnection {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // This is the only handle; a discarded connection closes when it
        // drops below.
        if !self.discard {
            self.pool.release(self.conn.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn pool(options: PoolOptions) -> (Arc<ConnectionPool>, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pool.db");
        let db = libsql::Builder::new_local(path.to_str().unwrap())
            .build()
            .await
            .unwrap();
        (Arc::new(ConnectionPool::new(db, options)), dir)
    }

    fn small(size: usize, max_overflow: usize) -> PoolOptions {
        PoolOptions {
            size,
            max_overflow,
            timeout: Duration::from_millis(100),
            ..PoolOptions::default()
        }
    }

    #[test]
    fn options_follow_config() {
        let mut config = DatabaseConfig::default();
        config.connect_args.insert("busy_timeout".into(), "5000".into());
        let options = PoolOptions::from_config(&config);
        assert_eq!(options.max_connections(), 15);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.pragmas, vec![("busy_timeout".to_string(), "5000".to_string())]);
    }

    #[tokio::test]
    async fn connections_are_reused() {
        let (pool, _dir) = pool(small(2, 0)).await;
        {
            let conn = pool.acquire().await.unwrap();
            conn.execute("CREATE TABLE t (x INTEGER)", ()).await.unwrap();
            assert_eq!(pool.status().checked_out, 1);
        }
        assert_eq!(pool.status(), PoolStatus { idle: 1, checked_out: 0, max_connections: 2 });
        let _again = pool.acquire().await.unwrap();
        assert_eq!(pool.status().idle, 0);
    }

    #[tokio::test]
    async fn exhaustion_times_out() {
        let (pool, _dir) = pool(small(1, 0)).await;
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.err().unwrap();
        assert!(matches!(err, DatabaseError::PoolTimeout(_)), "{err:?}");
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn overflow_connections_are_not_retained() {
        let (pool, _dir) = pool(small(1, 1)).await;
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        drop(a);
        drop(b);
        assert_eq!(pool.status().idle, 1);
    }

    #[tokio::test]
    async fn discarded_connections_free_their_slot() {
        let (pool, _dir) = pool(small(1, 0)).await;
        let mut conn = pool.acquire().await.unwrap();
        conn.discard();
        drop(conn);
        assert_eq!(pool.status().idle, 0);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn pragmas_apply_to_new_connections() {
        let (pool, _dir) = pool(small(1, 0).pragma("busy_timeout", "1234")).await;
        let conn = pool.acquire().await.unwrap();
        let mut rows = conn.query("PRAGMA busy_timeout", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1234);
    }
}
