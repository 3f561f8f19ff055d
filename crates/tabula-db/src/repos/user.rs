//! User repository.

use tabula_core::entities::User;
use tabula_core::{CoreError, Value};

use crate::inputs::{UserCreate, UserUpdate};
use crate::repository::RepositoryConfig;
use crate::rules::{self, Rule};

/// Trimmed, non-blank user name.
fn clean_name(value: Value) -> Result<Value, CoreError> {
    match rules::trim(value)? {
        Value::Text(s) if s.is_empty() => Err(CoreError::conversion("name", "must not be blank")),
        other => Ok(other),
    }
}

/// Trimmed, lower-cased email. Blank becomes null.
fn clean_email(value: Value) -> Result<Value, CoreError> {
    rules::lowercase(rules::blank_to_null(rules::trim(value)?)?)
}

/// Flushes after each write; the unit of work commits.
pub struct UserRepository;

impl RepositoryConfig for UserRepository {
    type Table = User;
    type Create = UserCreate;
    type Update = UserUpdate;

    const CREATE_RULES: &'static [Rule] =
        &[Rule::new("name", clean_name), Rule::new("email", clean_email)];
    const UPDATE_RULES: &'static [Rule] =
        &[Rule::new("name", clean_name), Rule::new("email", clean_email)];
}
