//! Entity-contract error types for Tabula.
//!
//! These errors are raised while moving values in and out of entities:
//! constructing an entity from a field set, dispatching a setter, or running
//! an auto-convert rule. Storage errors (`DatabaseError`) live in `tabula-db`
//! and wrap this type.

use thiserror::Error;

/// Errors raised by the entity contract and value conversions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required field was absent from a create field set.
    #[error("Missing required field: {entity}.{field}")]
    MissingField { entity: String, field: String },

    /// A field name does not exist on the entity.
    #[error("Unknown field: {entity}.{field}")]
    UnknownField { entity: String, field: String },

    /// A value had the wrong shape for the field it was assigned to.
    #[error("Type mismatch for field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A non-nullable field received `Null`.
    #[error("Field '{field}' cannot be null")]
    NullNotAllowed { field: String },

    /// An auto-convert rule rejected its input.
    #[error("Conversion failed for field '{field}': {reason}")]
    Conversion { field: String, reason: String },

    /// Data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Shorthand used by auto-convert rules.
    pub fn conversion(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
