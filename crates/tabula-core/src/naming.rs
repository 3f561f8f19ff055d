//! Table naming and schema constraint naming.
//!
//! Table names are derived from the entity type name: word boundaries become
//! underscores, the result is lower-cased and then pluralized.
//!
//! The pluralizer is a narrow English heuristic: a trailing `y` becomes `ie`
//! before the `s` suffix, everything else just gets `s`. Irregular plurals
//! (`Person` -> `persons`, `Key` -> `keies`) are a known limitation; entities
//! that need a different name override `Entity::table_name`.

use serde::{Deserialize, Serialize};

/// Convert a `CamelCase` type name into `snake_case`.
///
/// A separator is inserted at a lower-to-upper (or digit-to-upper) transition
/// and before the last capital of an acronym run that is followed by a
/// lower-case letter (`HTTPResponse` -> `http_response`).
#[must_use]
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Pluralize a `snake_case` name with the `y -> ies` rule.
#[must_use]
pub fn pluralize(name: &str) -> String {
    name.strip_suffix('y')
        .map_or_else(|| format!("{name}s"), |stem| format!("{stem}ies"))
}

/// Derive the storage table name for an entity type name.
///
/// ```
/// use tabula_core::naming::table_name;
///
/// assert_eq!(table_name("UserAccount"), "user_accounts");
/// assert_eq!(table_name("Category"), "categories");
/// ```
#[must_use]
pub fn table_name(type_name: &str) -> String {
    pluralize(&camel_to_snake(type_name))
}

/// Kinds of generated schema constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Index,
    Unique,
    Check,
    ForeignKey,
    PrimaryKey,
}

/// Deterministic templates for generated constraint names.
///
/// Placeholders: `{table}`, `{column}`, `{label}` (`{table}_{column}`),
/// `{referred_table}` and `{constraint}`. Stable names keep schema diffs
/// between regenerations empty.
///
/// Built once at process start and handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConvention {
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_unique")]
    pub unique: String,
    #[serde(default = "default_check")]
    pub check: String,
    #[serde(default = "default_foreign_key")]
    pub foreign_key: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
}

fn default_index() -> String {
    "ix_{label}".to_string()
}

fn default_unique() -> String {
    "uq_{table}_{column}".to_string()
}

fn default_check() -> String {
    "ck_{table}_{constraint}".to_string()
}

fn default_foreign_key() -> String {
    "fk_{table}_{column}_{referred_table}".to_string()
}

fn default_primary_key() -> String {
    "pk_{table}".to_string()
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            index: default_index(),
            unique: default_unique(),
            check: default_check(),
            foreign_key: default_foreign_key(),
            primary_key: default_primary_key(),
        }
    }
}

/// The inputs a constraint template can reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintTarget<'a> {
    pub table: &'a str,
    pub column: Option<&'a str>,
    pub referred_table: Option<&'a str>,
    pub constraint: Option<&'a str>,
}

impl NamingConvention {
    #[must_use]
    pub fn template(&self, kind: ConstraintKind) -> &str {
        match kind {
            ConstraintKind::Index => &self.index,
            ConstraintKind::Unique => &self.unique,
            ConstraintKind::Check => &self.check,
            ConstraintKind::ForeignKey => &self.foreign_key,
            ConstraintKind::PrimaryKey => &self.primary_key,
        }
    }

    /// Render the constraint name for `kind`.
    #[must_use]
    pub fn render(&self, kind: ConstraintKind, target: ConstraintTarget<'_>) -> String {
        let column = target.column.unwrap_or_default();
        let label = if column.is_empty() {
            target.table.to_string()
        } else {
            format!("{}_{column}", target.table)
        };
        self.template(kind)
            .replace("{label}", &label)
            .replace("{table}", target.table)
            .replace("{column}", column)
            .replace("{referred_table}", target.referred_table.unwrap_or_default())
            .replace("{constraint}", target.constraint.unwrap_or_default())
    }

    #[must_use]
    pub fn index_name(&self, table: &str, column: &str) -> String {
        self.render(
            ConstraintKind::Index,
            ConstraintTarget {
                table,
                column: Some(column),
                ..ConstraintTarget::default()
            },
        )
    }

    #[must_use]
    pub fn unique_name(&self, table: &str, column: &str) -> String {
        self.render(
            ConstraintKind::Unique,
            ConstraintTarget {
                table,
                column: Some(column),
                ..ConstraintTarget::default()
            },
        )
    }

    #[must_use]
    pub fn check_name(&self, table: &str, constraint: &str) -> String {
        self.render(
            ConstraintKind::Check,
            ConstraintTarget {
                table,
                constraint: Some(constraint),
                ..ConstraintTarget::default()
            },
        )
    }

    #[must_use]
    pub fn foreign_key_name(&self, table: &str, column: &str, referred_table: &str) -> String {
        self.render(
            ConstraintKind::ForeignKey,
            ConstraintTarget {
                table,
                column: Some(column),
                referred_table: Some(referred_table),
                constraint: None,
            },
        )
    }

    #[must_use]
    pub fn primary_key_name(&self, table: &str) -> String {
        self.render(
            ConstraintKind::PrimaryKey,
            ConstraintTarget {
                table,
                ..ConstraintTarget::default()
            },
        )
    }
}
