//! Relational backend dialects and their native type capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The relational backend in use.
///
/// A dialect decides whether identifiers and timestamps can be stored in
/// native column types or need a portable fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    /// Resolve a dialect from a connection driver name.
    ///
    /// Accepts bare names (`sqlite`, `postgresql`) and driver-qualified names
    /// (`postgresql+asyncpg`, `sqlite+aiosqlite`). Returns `None` for unknown
    /// backends.
    #[must_use]
    pub fn from_driver(driver: &str) -> Option<Self> {
        let backend = driver
            .split('+')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match backend.as_str() {
            "sqlite" | "libsql" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
        }
    }

    /// Whether the backend has a native UUID column type.
    #[must_use]
    pub const fn supports_native_uuid(self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Whether the backend stores timezone offsets alongside timestamps.
    #[must_use]
    pub const fn supports_timezone(self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Bind placeholder for the 1-based parameter `n`.
    #[must_use]
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Sqlite => format!("?{n}"),
            Self::Postgres => format!("${n}"),
            Self::MySql => "?".to_string(),
        }
    }

    /// Quote an identifier for use in generated SQL.
    #[must_use]
    pub fn quote_ident(self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Sqlite | Self::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Whether `UPDATE ... RETURNING` is available.
    #[must_use]
    pub const fn supports_returning(self) -> bool {
        matches!(self, Self::Sqlite | Self::Postgres)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
