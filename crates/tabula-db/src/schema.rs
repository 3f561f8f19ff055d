//! Table DDL derived from an entity's column declarations.
//!
//! Every statement uses `IF NOT EXISTS` so registration can run on every
//! startup. Constraint names come from the engine's [`NamingConvention`].

use tabula_core::entity::{CREATED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN};
use tabula_core::{Column, ColumnType, Dialect, Entity, NamingConvention};

/// Storage type for a logical column type.
#[must_use]
pub const fn column_sql_type(ty: ColumnType, dialect: Dialect) -> &'static str {
    match (ty, dialect) {
        (ColumnType::Uuid, Dialect::Postgres) => "UUID",
        (ColumnType::Uuid, _) => "CHAR(36)",
        (ColumnType::Timestamp, Dialect::Postgres) => "TIMESTAMP WITH TIME ZONE",
        (ColumnType::Timestamp, _) => "TIMESTAMP",
        (ColumnType::Text, Dialect::MySql) => "VARCHAR(255)",
        (ColumnType::Text, _) => "TEXT",
        (ColumnType::Integer, Dialect::Postgres | Dialect::MySql) => "BIGINT",
        (ColumnType::Integer, Dialect::Sqlite) => "INTEGER",
        (ColumnType::Real, Dialect::Postgres) => "DOUBLE PRECISION",
        (ColumnType::Real, Dialect::MySql) => "DOUBLE",
        (ColumnType::Real, Dialect::Sqlite) => "REAL",
        (ColumnType::Boolean, _) => "BOOLEAN",
        (ColumnType::Blob, Dialect::Postgres) => "BYTEA",
        (ColumnType::Blob, _) => "BLOB",
    }
}

fn column_def(dialect: Dialect, name: &str, ty: ColumnType, nullable: bool) -> String {
    let null = if nullable { "" } else { " NOT NULL" };
    format!(
        "{} {}{null}",
        dialect.quote_ident(name),
        column_sql_type(ty, dialect)
    )
}

/// `CREATE TABLE` plus index statements for `E`, in execution order.
///
/// Column order is `id`, `created_at`, `updated_at`, then the entity's own
/// columns as declared.
#[must_use]
pub fn create_table_sql<E: Entity>(dialect: Dialect, naming: &NamingConvention) -> Vec<String> {
    let table = E::table_name();
    let q = |ident: &str| dialect.quote_ident(ident);

    let mut defs = vec![
        column_def(dialect, ID_COLUMN, ColumnType::Uuid, false),
        column_def(dialect, CREATED_AT_COLUMN, ColumnType::Timestamp, false),
        column_def(dialect, UPDATED_AT_COLUMN, ColumnType::Timestamp, false),
    ];
    defs.extend(
        E::COLUMNS
            .iter()
            .map(|c| column_def(dialect, c.name, c.ty, c.nullable)),
    );

    defs.push(format!(
        "CONSTRAINT {} PRIMARY KEY ({})",
        q(&naming.primary_key_name(&table)),
        q(ID_COLUMN)
    ));
    for column in E::COLUMNS.iter().filter(|c| c.unique) {
        defs.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            q(&naming.unique_name(&table, column.name)),
            q(column.name)
        ));
    }
    for (column, referred) in E::COLUMNS
        .iter()
        .filter_map(|c| c.references.map(|r| (c, r)))
    {
        defs.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            q(&naming.foreign_key_name(&table, column.name, referred)),
            q(column.name),
            q(referred),
            q(ID_COLUMN)
        ));
    }
    for (name, expr) in E::COLUMNS.iter().filter_map(|c| c.check) {
        defs.push(format!(
            "CONSTRAINT {} CHECK ({expr})",
            q(&naming.check_name(&table, name))
        ));
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        q(&table),
        defs.join(",\n    ")
    )];

    let indexed = std::iter::once(ID_COLUMN).chain(
        E::COLUMNS
            .iter()
            .filter(|c| c.indexed)
            .map(|c: &Column| c.name),
    );
    let if_not_exists = if dialect == Dialect::MySql {
        ""
    } else {
        "IF NOT EXISTS "
    };
    for column in indexed {
        statements.push(format!(
            "CREATE INDEX {if_not_exists}{} ON {} ({})",
            q(&naming.index_name(&table, column)),
            q(&table),
            q(column)
        ));
    }
    statements
}
