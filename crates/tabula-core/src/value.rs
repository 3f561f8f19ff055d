//! Canonical in-memory field values.
//!
//! `Value` is what entities, inputs and auto-convert rules exchange. It is
//! dialect-independent: identifiers are always `Uuid` and timestamps are
//! always UTC instants. Storage-side representations live in
//! `tabula_db::codec`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Short type name used in error messages.
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
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the text payload, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Typed extraction of a field from a `Value`.
///
/// `field` is only used to label errors.
pub trait FromValue: Sized {
    /// Convert a present value.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::TypeMismatch` or `CoreError::NullNotAllowed` when the
    /// value cannot represent `Self`.
    fn from_value(field: &str, value: Value) -> Result<Self, CoreError>;

    /// Produce a value for a field that is absent from a field set.
    ///
    /// # Errors
    ///
    /// Required types return `CoreError::MissingField`.
    fn from_missing(entity: &str, field: &str) -> Result<Self, CoreError> {
        Err(CoreError::MissingField {
            entity: entity.to_string(),
            field: field.to_string(),
        })
    }
}

fn mismatch(field: &str, expected: &'static str, found: &Value) -> CoreError {
    if found.is_null() {
        CoreError::NullNotAllowed {
            field: field.to_string(),
        }
    } else {
        CoreError::TypeMismatch {
            field: field.to_string(),
            expected,
            found: found.type_name(),
        }
    }
}

impl FromValue for String {
    fn from_value(field: &str, value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch(field, "text", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(field: &str, value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Integer(i) => Ok(i != 0),
            other => Err(mismatch(field, "bool", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(field: &str, value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(mismatch(field, "integer", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(field: &str, value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Real(r) => Ok(r),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(i) => Ok(i as Self),
            other => Err(mismatch(field, "real", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(field: &str, value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Blob(b) => Ok(b),
            other => Err(mismatch(field, "blob", &other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(field: &str, value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Uuid(u) => Ok(u),
            other => Err(mismatch(field, "uuid", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(field: &str, value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Timestamp(t) => Ok(t),
            other => Err(mismatch(field, "timestamp", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(field: &str, value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(field, other).map(Some),
        }
    }

    fn from_missing(_entity: &str, _field: &str) -> Result<Self, CoreError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_maps_null_and_missing_to_none() {
        let got: Option<String> = FromValue::from_value("email", Value::Null).unwrap();
        assert_eq!(got, None);
        let missing: Option<String> = FromValue::from_missing("User", "email").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn required_missing_is_an_error() {
        let err = <String as FromValue>::from_missing("User", "name").unwrap_err();
        assert!(matches!(err, CoreError::MissingField { .. }));
        assert_eq!(err.to_string(), "Missing required field: User.name");
    }

    #[test]
    fn null_into_required_reports_null_not_allowed() {
        let err = String::from_value("name", Value::Null).unwrap_err();
        assert!(matches!(err, CoreError::NullNotAllowed { .. }));
    }

    #[test]
    fn mismatch_names_both_types() {
        let err = Uuid::from_value("id", Value::Integer(7)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch for field 'id': expected uuid, found integer"
        );
    }

    #[test]
    fn integer_widens_to_real_and_bool() {
        assert!((f64::from_value("x", Value::Integer(3)).unwrap() - 3.0).abs() < f64::EPSILON);
        assert!(bool::from_value("x", Value::Integer(1)).unwrap());
        assert!(!bool::from_value("x", Value::Integer(0)).unwrap());
    }

    #[test]
    fn option_from_impl() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
    }
}
