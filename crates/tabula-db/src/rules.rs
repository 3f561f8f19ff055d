//! Per-field auto-convert rules.
//!
//! A repository declares one rule set for create and one for update. Rules
//! are matched by field name and run on the input's field set before the
//! entity is built or mutated. Fields without a rule pass through untouched.

use tabula_core::{CoreError, FieldSet, Value};

/// A conversion applied to one field value.
pub type Converter = fn(Value) -> Result<Value, CoreError>;

#[derive(Clone, Copy)]
pub struct Rule {
    pub field: &'static str,
    pub convert: Converter,
}

impl Rule {
    #[must_use]
    pub const fn new(field: &'static str, convert: Converter) -> Self {
        Self { field, convert }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("field", &self.field).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
}

/// The create and update rule sets of one repository.
#[derive(Debug, Clone, Copy)]
pub struct AutoConvertRules {
    pub create: &'static [Rule],
    pub update: &'static [Rule],
}

impl AutoConvertRules {
    pub const EMPTY: Self = Self::new(&[], &[]);

    #[must_use]
    pub const fn new(create: &'static [Rule], update: &'static [Rule]) -> Self {
        Self { create, update }
    }

    #[must_use]
    pub const fn for_operation(&self, kind: OperationKind) -> &'static [Rule] {
        match kind {
            OperationKind::Create => self.create,
            OperationKind::Update => self.update,
        }
    }

    /// Run the rules for `kind` over `fields`, preserving field order.
    ///
    /// # Errors
    ///
    /// Returns the first converter error.
    pub fn apply(&self, kind: OperationKind, fields: FieldSet) -> Result<FieldSet, CoreError> {
        let rules = self.for_operation(kind);
        fields
            .into_iter()
            .map(|(name, value)| match rules.iter().find(|r| r.field == name) {
                Some(rule) => (rule.convert)(value).map(|v| (name, v)),
                None => Ok((name, value)),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Common converters
// ---------------------------------------------------------------------------

/// Strip surrounding whitespace from text. Other values pass through.
///
/// # Errors
///
/// Never fails; the signature matches [`Converter`].
#[allow(clippy::unnecessary_wraps)]
pub fn trim(value: Value) -> Result<Value, CoreError> {
    Ok(match value {
        Value::Text(s) => Value::Text(s.trim().to_string()),
        other => other,
    })
}

/// Lower-case text. Other values pass through.
///
/// # Errors
///
/// Never fails; the signature matches [`Converter`].
#[allow(clippy::unnecessary_wraps)]
pub fn lowercase(value: Value) -> Result<Value, CoreError> {
    Ok(match value {
        Value::Text(s) => Value::Text(s.to_lowercase()),
        other => other,
    })
}

/// Turn blank text into null.
///
/// # Errors
///
/// Never fails; the signature matches [`Converter`].
#[allow(clippy::unnecessary_wraps)]
pub fn blank_to_null(value: Value) -> Result<Value, CoreError> {
    Ok(match value {
        Value::Text(s) if s.trim().is_empty() => Value::Null,
        other => other,
    })
}
