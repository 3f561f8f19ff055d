//! Unit-of-work session.
//!
//! A session is one transaction boundary owned by one logical operation:
//!
//! ```text
//! Idle --first use--> Active --complete(Ok)--> Committing --> Closed
//!                        \----complete(Err)--> RollingBack --> Closed
//! ```
//!
//! The connection is checked out on first use and the transaction begins
//! before the first write. Writes registered with [`Session::add`] are
//! queued and sent on [`Session::flush`]; reads flush first so the session
//! always sees its own writes. A read with no transaction open (a fresh
//! session, or right after a commit) runs in autocommit mode and holds no
//! lock once its rows are collected.
//!
//! Dropping a session that still holds an open transaction (for example when
//! the owning future is cancelled) discards its connection instead of
//! returning it to the pool. Closing the `SQLite` connection rolls the
//! transaction back, so cancellation still ends in a rollback.

use std::fmt;

use tabula_core::Dialect;

use crate::Engine;
use crate::codec::SqlValue;
use crate::error::DatabaseError;
use crate::pool::PooledConnection;

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Committing,
    RollingBack,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Committing => "committing",
            Self::RollingBack => "rolling_back",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A SQL statement with positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    #[must_use]
    pub fn bind(mut self, value: SqlValue) -> Self {
        self.params.push(value);
        self
    }

    fn libsql_params(&self) -> libsql::params::Params {
        libsql::params::Params::Positional(
            self.params.iter().cloned().map(libsql::Value::from).collect(),
        )
    }
}

/// One result row, values in select-list order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(Vec<SqlValue>);

impl Row {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.0.get(idx)
    }

    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.0
    }

    fn from_libsql(row: &libsql::Row) -> Result<Self, DatabaseError> {
        let count = row.column_count();
        let mut values = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
        for idx in 0..count {
            values.push(row.get_value(idx)?.into());
        }
        Ok(Self(values))
    }
}

/// A unit of work bound to one pooled connection.
pub struct Session {
    engine: Engine,
    conn: Option<PooledConnection>,
    state: SessionState,
    in_transaction: bool,
    pending: Vec<Statement>,
}

impl Session {
    pub(crate) const fn new(engine: Engine) -> Self {
        Self {
            engine,
            conn: None,
            state: SessionState::Idle,
            in_transaction: false,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.engine.dialect()
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Number of registered writes not yet sent to the store.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn ensure_open(&mut self) -> Result<(), DatabaseError> {
        match self.state {
            SessionState::Closed => Err(DatabaseError::SessionClosed),
            SessionState::Idle => {
                self.state = SessionState::Active;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Check out a connection. For writes, also open a transaction if none
    /// is open yet.
    async fn begin(&mut self, write: bool) -> Result<&PooledConnection, DatabaseError> {
        self.ensure_open()?;
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = self.engine.pool().acquire().await?;
                tracing::debug!("session checked out connection");
                conn
            }
        };
        let conn = self.conn.insert(conn);
        if write && !self.in_transaction {
            conn.execute("BEGIN", ()).await?;
            self.in_transaction = true;
            tracing::debug!("session began transaction");
        }
        Ok(&*conn)
    }

    /// Register a write. It is sent to the store on the next flush.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::SessionClosed` once the session is closed.
    pub fn add(&mut self, statement: Statement) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.pending.push(statement);
        Ok(())
    }

    /// Send every registered write to the store inside the open transaction.
    ///
    /// # Errors
    ///
    /// Returns the store error of the first failing statement. Writes after it
    /// are dropped; the transaction stays open for the caller to roll back.
    pub async fn flush(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        let conn = self.begin(true).await?;
        for statement in &pending {
            conn.execute(&statement.sql, statement.libsql_params()).await?;
        }
        tracing::debug!(statements = pending.len(), "session flushed");
        Ok(())
    }

    /// Flush, then run `statement` immediately. Returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn execute(&mut self, statement: Statement) -> Result<u64, DatabaseError> {
        self.flush().await?;
        let conn = self.begin(true).await?;
        Ok(conn.execute(&statement.sql, statement.libsql_params()).await?)
    }

    /// Flush, then run a read and collect every row. Runs inside the open
    /// transaction if there is one; otherwise none is started.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn query(&mut self, statement: Statement) -> Result<Vec<Row>, DatabaseError> {
        self.fetch(statement, false).await
    }

    /// Flush, then run a write that returns rows (`... RETURNING`) inside
    /// the transaction.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn execute_returning(&mut self, statement: Statement) -> Result<Vec<Row>, DatabaseError> {
        self.fetch(statement, true).await
    }

    async fn fetch(&mut self, statement: Statement, write: bool) -> Result<Vec<Row>, DatabaseError> {
        self.flush().await?;
        let conn = self.begin(write).await?;
        let mut rows = conn.query(&statement.sql, statement.libsql_params()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Row::from_libsql(&row)?);
        }
        Ok(out)
    }

    /// Flush and commit. The next write opens a new transaction.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged. The transaction stays open.
    pub async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.flush().await?;
        if self.in_transaction {
            if let Some(conn) = &self.conn {
                conn.execute("COMMIT", ()).await?;
            }
            self.in_transaction = false;
            tracing::debug!("session committed");
        }
        Ok(())
    }

    /// Drop registered writes and roll back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn rollback(&mut self) -> Result<(), DatabaseError> {
        if self.state == SessionState::Closed {
            return Err(DatabaseError::SessionClosed);
        }
        self.pending.clear();
        if self.in_transaction {
            if let Some(conn) = &self.conn {
                conn.execute("ROLLBACK", ()).await?;
            }
            self.in_transaction = false;
            tracing::debug!("session rolled back");
        }
        Ok(())
    }

    /// Roll back anything still open and return the connection.
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the rollback error; the connection is released regardless.
    pub async fn close(&mut self) -> Result<(), DatabaseError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let outcome = self.rollback().await;
        self.release();
        outcome
    }

    /// Take the single terminal action for `result` and close.
    ///
    /// `Ok` commits; if the commit fails a rollback is attempted and the
    /// commit error is returned. `Err` rolls back; if the rollback fails its
    /// error replaces the original one. The connection is released on every
    /// path.
    ///
    /// # Errors
    ///
    /// Returns `result`'s error, or the commit/rollback error as above.
    pub async fn complete<T, E>(mut self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<DatabaseError>,
    {
        if self.state == SessionState::Closed {
            return result;
        }
        let outcome = match result {
            Ok(value) => {
                self.state = SessionState::Committing;
                match self.commit().await {
                    Ok(()) => Ok(value),
                    Err(error) => {
                        tracing::warn!(%error, "commit failed, rolling back");
                        if let Err(rollback_error) = self.rollback().await {
                            tracing::warn!(error = %rollback_error, "rollback after failed commit failed");
                        }
                        Err(E::from(error))
                    }
                }
            }
            Err(error) => {
                self.state = SessionState::RollingBack;
                match self.rollback().await {
                    Ok(()) => Err(error),
                    Err(rollback_error) => Err(E::from(rollback_error)),
                }
            }
        };
        self.release();
        outcome
    }

    fn release(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if self.in_transaction {
                conn.discard();
            }
        }
        self.in_transaction = false;
        self.pending.clear();
        self.state = SessionState::Closed;
        tracing::debug!("session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.in_transaction {
            tracing::warn!(state = %self.state, "session dropped with open transaction, discarding connection");
            if let Some(conn) = self.conn.as_mut() {
                conn.discard();
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("in_transaction", &self.in_transaction)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
