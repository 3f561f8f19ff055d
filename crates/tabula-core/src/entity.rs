//! The entity contract every table-backed type satisfies.
//!
//! An entity is composed at its definition site from:
//! - an `id: Uuid` identity, generated client-side at creation,
//! - a [`Timestamps`] audit block,
//! - a static column schema ([`Column`]) for everything else,
//! - typed getter/setter dispatch (`field` / `set_field`) keyed by column name.
//!
//! The repository in `tabula-db` is generic over this trait and never
//! hand-written per entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::naming;
use crate::value::{FromValue, Value};

/// Identity column name.
pub const ID_COLUMN: &str = "id";
/// Creation timestamp column name.
pub const CREATED_AT_COLUMN: &str = "created_at";
/// Last-update timestamp column name.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Columns every entity carries ahead of its own.
pub const BASE_COLUMNS: [&str; 3] = [ID_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN];

/// Current instant in UTC.
#[must_use]
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Logical column types. Dialect-specific storage is chosen by the codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    Blob,
    Uuid,
    Timestamp,
}

/// Static description of one entity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub indexed: bool,
    pub references: Option<&'static str>,
    /// Named check constraint: `(name, sql expression)`.
    pub check: Option<(&'static str, &'static str)>,
}

impl Column {
    #[must_use]
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            unique: false,
            indexed: false,
            references: None,
            check: None,
        }
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Foreign key to the identity column of `table`.
    #[must_use]
    pub const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }

    #[must_use]
    pub const fn check(mut self, name: &'static str, expr: &'static str) -> Self {
        self.check = Some((name, expr));
        self
    }
}

/// Audit timestamps shared by all entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    /// Both timestamps set to the same current instant.
    #[must_use]
    pub fn now() -> Self {
        let now = utc_now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    /// Reset `updated_at` to the current instant.
    pub fn touch(&mut self) -> DateTime<Utc> {
        self.updated_at = utc_now();
        self.updated_at
    }
}

/// Ordered `(field, value)` pairs.
///
/// Create inputs produce every field; update inputs produce only the fields
/// the caller set, so an absent field means "leave unchanged" while a
/// present `Value::Null` means "set to null".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet(Vec<(&'static str, Value)>);

impl FieldSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, field: &'static str, value: impl Into<Value>) {
        let value = value.into();
        match self.0.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field, value)),
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.iter().find(|(name, _)| *name == field).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Remove a field and convert it. Missing fields go through
    /// [`FromValue::from_missing`], so optional fields default to `None`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` when a required field is missing or has the wrong type.
    pub fn take<T: FromValue>(&mut self, entity: &str, field: &str) -> Result<T, CoreError> {
        match self.0.iter().position(|(name, _)| *name == field) {
            Some(idx) => T::from_value(field, self.0.remove(idx).1),
            None => T::from_missing(entity, field),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.0.iter().map(|(name, v)| (*name, v))
    }
}

impl IntoIterator for FieldSet {
    type Item = (&'static str, Value);
    type IntoIter = std::vec::IntoIter<(&'static str, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(&'static str, Value)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (&'static str, Value)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

/// Conversion of a Create-Input or Update-Input into a field set.
pub trait IntoFields {
    fn into_fields(self) -> FieldSet;
}

impl IntoFields for FieldSet {
    fn into_fields(self) -> FieldSet {
        self
    }
}

/// A persisted, table-backed record.
pub trait Entity: Sized + Clone + Send + Sync + std::fmt::Debug {
    /// Type name used for table naming and diagnostics.
    const TYPE_NAME: &'static str;

    /// Entity-specific columns. `id`, `created_at` and `updated_at` are implied.
    const COLUMNS: &'static [Column];

    /// Storage table name. Defaults to the pluralized `snake_case` type name.
    #[must_use]
    fn table_name() -> String {
        naming::table_name(Self::TYPE_NAME)
    }

    /// Look up a column declaration by name.
    #[must_use]
    fn column(name: &str) -> Option<&'static Column> {
        Self::COLUMNS.iter().find(|c| c.name == name)
    }

    fn id(&self) -> Uuid;

    fn timestamps(&self) -> &Timestamps;

    fn timestamps_mut(&mut self) -> &mut Timestamps;

    /// Build an entity from its identity, audit block and field values.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` when a required field is missing or mistyped.
    fn from_fields(id: Uuid, timestamps: Timestamps, fields: FieldSet)
    -> Result<Self, CoreError>;

    /// Read one entity column.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnknownField` for names outside `COLUMNS`.
    fn field(&self, name: &str) -> Result<Value, CoreError>;

    /// Assign one entity column.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` for unknown names or mistyped values.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CoreError>;

    /// Helper for `field`/`set_field` fall-through arms.
    fn unknown_field(name: &str) -> CoreError {
        CoreError::UnknownField {
            entity: Self::TYPE_NAME.to_string(),
            field: name.to_string(),
        }
    }
}
