//! Dialect-independent value codecs.
//!
//! Identifiers and timestamps have one canonical in-memory form (`Uuid`,
//! `DateTime<Utc>`) but different storage forms per backend:
//!
//! | Value     | Native backend (Postgres)        | Other backends                    |
//! |-----------|----------------------------------|-----------------------------------|
//! | UUID      | `UUID` column, value passed as is | `CHAR(36)` canonical hyphenated text |
//! | Timestamp | `TIMESTAMP WITH TIME ZONE`       | naive UTC, reinterpreted as UTC on read |
//!
//! [`SqlValue`] is the storage-side representation. The libSQL bridge at the
//! bottom of this module maps it onto `libsql::Value`.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use tabula_core::{Column, ColumnType, CoreError, Dialect, Value};
use uuid::Uuid;

use crate::error::DatabaseError;

/// Text format for naive timestamps. Keeps full sub-second precision.
const NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Storage-side value as a backend sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Native UUID column value.
    Uuid(Uuid),
    /// Native timezone-aware timestamp.
    Timestamp(DateTime<FixedOffset>),
    /// Timestamp without offset information.
    NaiveTimestamp(NaiveDateTime),
}

impl SqlValue {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
            Self::NaiveTimestamp(_) => "naive timestamp",
        }
    }
}

// ---------------------------------------------------------------------------
// Identifier codec
// ---------------------------------------------------------------------------

/// Encodes UUIDs natively where the dialect allows, as 36-char text elsewhere.
pub struct UuidCodec;

impl UuidCodec {
    /// Length of the canonical hyphenated text form.
    pub const TEXT_LEN: usize = 36;

    #[must_use]
    pub fn encode(value: Option<Uuid>, dialect: Dialect) -> SqlValue {
        match value {
            None => SqlValue::Null,
            Some(id) if dialect.supports_native_uuid() => SqlValue::Uuid(id),
            Some(id) => SqlValue::Text(id.hyphenated().to_string()),
        }
    }

    /// Encode a UUID supplied as text. The text is parsed first so only
    /// canonical values reach storage.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::TypeMismatch` if `value` is not a UUID.
    pub fn encode_str(value: &str, dialect: Dialect) -> Result<SqlValue, CoreError> {
        let id = Uuid::try_parse(value).map_err(|_| CoreError::TypeMismatch {
            field: "uuid".into(),
            expected: "uuid",
            found: "text",
        })?;
        Ok(Self::encode(Some(id), dialect))
    }

    /// Decode a stored identifier. `Null` decodes to `None`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::IntegrityDecode` for any non-null value that is
    /// not a UUID. That means the store is corrupt; it is never coerced.
    pub fn decode(value: SqlValue, column: &str) -> Result<Option<Uuid>, DatabaseError> {
        match value {
            SqlValue::Null => Ok(None),
            SqlValue::Uuid(id) => Ok(Some(id)),
            SqlValue::Text(s) => {
                if s.len() != Self::TEXT_LEN {
                    return Err(DatabaseError::integrity(
                        column,
                        format!("expected {}-char UUID text, got {:?}", Self::TEXT_LEN, s),
                    ));
                }
                Uuid::try_parse(&s).map(Some).map_err(|e| {
                    DatabaseError::integrity(column, format!("invalid UUID {s:?}: {e}"))
                })
            }
            SqlValue::Blob(bytes) => Uuid::from_slice(&bytes).map(Some).map_err(|e| {
                DatabaseError::integrity(column, format!("invalid UUID bytes: {e}"))
            }),
            other => Err(DatabaseError::integrity(
                column,
                format!("cannot decode UUID from {}", other.type_name()),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamp codec
// ---------------------------------------------------------------------------

/// Keeps timestamps absolute across backends with and without offsets.
pub struct TimestampCodec;

impl TimestampCodec {
    /// Values are already UTC when they get here; the only choice is whether
    /// the backend keeps the offset.
    #[must_use]
    pub fn encode(value: DateTime<Utc>, dialect: Dialect) -> SqlValue {
        if dialect.supports_timezone() {
            SqlValue::Timestamp(value.fixed_offset())
        } else {
            SqlValue::NaiveTimestamp(value.naive_utc())
        }
    }

    /// Decode a stored timestamp into UTC.
    ///
    /// Aware values are converted to UTC. Naive values, and naive text from
    /// backends without a timestamp type, are taken to be UTC already: the
    /// offset is attached and the wall-clock value is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::IntegrityDecode` for unparseable values.
    pub fn decode(value: SqlValue, column: &str) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        match value {
            SqlValue::Null => Ok(None),
            SqlValue::Timestamp(dt) => Ok(Some(dt.with_timezone(&Utc))),
            SqlValue::NaiveTimestamp(naive) => Ok(Some(naive.and_utc())),
            SqlValue::Text(s) => parse_datetime(&s)
                .map(Some)
                .map_err(|reason| DatabaseError::integrity(column, reason)),
            other => Err(DatabaseError::integrity(
                column,
                format!("cannot decode timestamp from {}", other.type_name()),
            )),
        }
    }
}

/// Parse a TEXT timestamp as UTC.
///
/// Handles RFC 3339 (`"2026-02-09T14:30:00+00:00"`), the naive storage format
/// (`"2026-02-09 14:30:00.123456"`) and `SQLite`'s `datetime('now')` output
/// (`"2026-02-09 14:30:00"`).
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, NAIVE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("failed to parse datetime {s:?}: {e}"))
}

// ---------------------------------------------------------------------------
// Column routing
// ---------------------------------------------------------------------------

fn mismatch(column: &Column, value: &Value) -> CoreError {
    CoreError::TypeMismatch {
        field: column.name.to_string(),
        expected: column_type_name(column.ty),
        found: value.type_name(),
    }
}

const fn column_type_name(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Text => "text",
        ColumnType::Integer => "integer",
        ColumnType::Real => "real",
        ColumnType::Boolean => "bool",
        ColumnType::Blob => "blob",
        ColumnType::Uuid => "uuid",
        ColumnType::Timestamp => "timestamp",
    }
}

/// Encode an entity value for `column`, routing identifiers and timestamps
/// through their codecs.
///
/// # Errors
///
/// Returns `CoreError` when the value does not fit the column.
pub fn encode_column(column: &Column, value: Value, dialect: Dialect) -> Result<SqlValue, CoreError> {
    if value.is_null() {
        return if column.nullable {
            Ok(SqlValue::Null)
        } else {
            Err(CoreError::NullNotAllowed {
                field: column.name.to_string(),
            })
        };
    }
    match (column.ty, value) {
        (ColumnType::Uuid, Value::Uuid(id)) => Ok(UuidCodec::encode(Some(id), dialect)),
        (ColumnType::Uuid, Value::Text(s)) => UuidCodec::encode_str(&s, dialect).map_err(|_| {
            CoreError::TypeMismatch {
                field: column.name.to_string(),
                expected: "uuid",
                found: "text",
            }
        }),
        (ColumnType::Timestamp, Value::Timestamp(t)) => Ok(TimestampCodec::encode(t, dialect)),
        (ColumnType::Text, Value::Text(s)) => Ok(SqlValue::Text(s)),
        (ColumnType::Integer, Value::Integer(i)) => Ok(SqlValue::Integer(i)),
        (ColumnType::Real, Value::Real(r)) => Ok(SqlValue::Real(r)),
        #[allow(clippy::cast_precision_loss)]
        (ColumnType::Real, Value::Integer(i)) => Ok(SqlValue::Real(i as f64)),
        (ColumnType::Boolean, Value::Bool(b)) => Ok(if dialect == Dialect::Postgres {
            SqlValue::Bool(b)
        } else {
            SqlValue::Integer(i64::from(b))
        }),
        (ColumnType::Blob, Value::Blob(b)) => Ok(SqlValue::Blob(b)),
        (_, other) => Err(mismatch(column, &other)),
    }
}

/// Decode a stored value for `column` back into its canonical form.
///
/// # Errors
///
/// Returns `DatabaseError::IntegrityDecode` when the stored value does not
/// match the column's declared type.
pub fn decode_column(column: &Column, value: SqlValue) -> Result<Value, DatabaseError> {
    let name = column.name;
    if matches!(value, SqlValue::Null) {
        return Ok(Value::Null);
    }
    match column.ty {
        ColumnType::Uuid => Ok(UuidCodec::decode(value, name)?.into()),
        ColumnType::Timestamp => Ok(TimestampCodec::decode(value, name)?.into()),
        ColumnType::Text => match value {
            SqlValue::Text(s) => Ok(Value::Text(s)),
            other => Err(unexpected(name, "text", &other)),
        },
        ColumnType::Integer => match value {
            SqlValue::Integer(i) => Ok(Value::Integer(i)),
            other => Err(unexpected(name, "integer", &other)),
        },
        ColumnType::Real => match value {
            SqlValue::Real(r) => Ok(Value::Real(r)),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Integer(i) => Ok(Value::Real(i as f64)),
            other => Err(unexpected(name, "real", &other)),
        },
        ColumnType::Boolean => match value {
            SqlValue::Bool(b) => Ok(Value::Bool(b)),
            SqlValue::Integer(i) => Ok(Value::Bool(i != 0)),
            other => Err(unexpected(name, "bool", &other)),
        },
        ColumnType::Blob => match value {
            SqlValue::Blob(b) => Ok(Value::Blob(b)),
            other => Err(unexpected(name, "blob", &other)),
        },
    }
}

fn unexpected(column: &str, expected: &str, found: &SqlValue) -> DatabaseError {
    DatabaseError::integrity(
        column,
        format!("expected {expected}, found {}", found.type_name()),
    )
}

// ---------------------------------------------------------------------------
// libSQL bridge
// ---------------------------------------------------------------------------

impl From<SqlValue> for libsql::Value {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Bool(b) => Self::Integer(i64::from(b)),
            SqlValue::Integer(i) => Self::Integer(i),
            SqlValue::Real(r) => Self::Real(r),
            SqlValue::Text(s) => Self::Text(s),
            SqlValue::Blob(b) => Self::Blob(b),
            SqlValue::Uuid(id) => Self::Text(id.hyphenated().to_string()),
            SqlValue::Timestamp(dt) => Self::Text(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            SqlValue::NaiveTimestamp(naive) => Self::Text(naive.format(NAIVE_FORMAT).to_string()),
        }
    }
}

impl From<libsql::Value> for SqlValue {
    fn from(value: libsql::Value) -> Self {
        match value {
            libsql::Value::Null => Self::Null,
            libsql::Value::Integer(i) => Self::Integer(i),
            libsql::Value::Real(r) => Self::Real(r),
            libsql::Value::Text(s) => Self::Text(s),
            libsql::Value::Blob(b) => Self::Blob(b),
        }
    }
}
