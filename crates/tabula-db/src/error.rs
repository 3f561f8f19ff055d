//! Database error types for tabula-db.
//!
//! The repository adds three failures of its own (`NotFound`,
//! `Configuration`, `IntegrityDecode`). Store failures from libSQL pass
//! through unchanged as `LibSql`; nothing here is retried.

use std::time::Duration;

use tabula_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// No row matches the identifier.
    #[error("Object with id={id} not found in '{table}'")]
    NotFound { table: String, id: Uuid },

    /// Static repository or engine wiring is missing or contradictory.
    /// A programming defect: do not retry.
    #[error("Repository configuration error: {0}")]
    Configuration(String),

    /// A stored value could not be decoded into its canonical type.
    #[error("Integrity error decoding '{column}': {reason}")]
    IntegrityDecode { column: String, reason: String },

    /// No pooled connection became available in time.
    #[error("Connection pool exhausted: no connection available after {0:?}")]
    PoolTimeout(Duration),

    /// The session already reached its terminal state.
    #[error("Session is closed")]
    SessionClosed,

    /// Entity contract or auto-convert failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Schema creation failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// A SQL query failed or returned something unexpected.
    #[error("Query failed: {0}")]
    Query(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    pub(crate) fn not_found(table: impl Into<String>, id: Uuid) -> Self {
        Self::NotFound {
            table: table.into(),
            id,
        }
    }

    pub(crate) fn integrity(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IntegrityDecode {
            column: column.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP-style status for the API layer: 404 for missing rows,
    /// 503 for pool exhaustion, 500 for everything else.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::PoolTimeout(_) => 503,
            _ => 500,
        }
    }
}
