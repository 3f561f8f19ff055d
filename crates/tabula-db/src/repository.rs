//! Generic CRUD repository over any [`Entity`].
//!
//! A concrete repository is a zero-sized type implementing
//! [`RepositoryConfig`]: it names the entity, its create and update inputs,
//! the completion policy and the auto-convert rules. [`Repository`] binds
//! that configuration to a borrowed [`Session`] and does the rest.
//!
//! Write paths end by triggering the completion policy:
//! - `Commit`: commit the session, then re-read the entity from the store.
//! - `Flush`: send pending writes inside the open transaction and return the
//!   in-memory entity. The caller's own commit makes it durable.

use std::collections::HashSet;
use std::marker::PhantomData;

use tabula_core::entity::{
    BASE_COLUMNS, CREATED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN, utc_now,
};
use tabula_core::{Dialect, Entity, FieldSet, IntoFields, Timestamps};
use uuid::Uuid;

use crate::codec::{TimestampCodec, UuidCodec, decode_column, encode_column};
use crate::error::DatabaseError;
use crate::rules::{AutoConvertRules, OperationKind, Rule};
use crate::session::{Row, Session, Statement};

/// Static wiring of one concrete repository.
pub trait RepositoryConfig {
    type Table: Entity;
    type Create: IntoFields;
    type Update: IntoFields;

    /// Commit after every write.
    const AUTO_COMMIT: bool = false;
    /// Flush after every write, leaving the commit to the session owner.
    const AUTO_FLUSH: bool = true;

    const CREATE_RULES: &'static [Rule] = &[];
    const UPDATE_RULES: &'static [Rule] = &[];

    #[must_use]
    fn rules() -> AutoConvertRules {
        AutoConvertRules::new(Self::CREATE_RULES, Self::UPDATE_RULES)
    }
}

/// How a write is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    Commit,
    Flush,
}

impl CompletionPolicy {
    /// Commit wins when both flags are set.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Configuration` when neither is set.
    pub fn resolve(auto_commit: bool, auto_flush: bool) -> Result<Self, DatabaseError> {
        match (auto_commit, auto_flush) {
            (true, _) => Ok(Self::Commit),
            (false, true) => Ok(Self::Flush),
            (false, false) => Err(DatabaseError::Configuration(
                "repository must set auto_commit or auto_flush".into(),
            )),
        }
    }
}

/// Check the entity's table declaration.
fn validate_table<E: Entity>() -> Result<String, DatabaseError> {
    let table = E::table_name();
    if table.trim().is_empty() {
        return Err(DatabaseError::Configuration(format!(
            "{} has no table name",
            E::TYPE_NAME
        )));
    }
    let mut seen = HashSet::new();
    for column in E::COLUMNS {
        if column.name.is_empty() {
            return Err(DatabaseError::Configuration(format!(
                "{table}: column with empty name"
            )));
        }
        if BASE_COLUMNS.contains(&column.name) {
            return Err(DatabaseError::Configuration(format!(
                "{table}: column '{}' shadows a base column",
                column.name
            )));
        }
        if !seen.insert(column.name) {
            return Err(DatabaseError::Configuration(format!(
                "{table}: duplicate column '{}'",
                column.name
            )));
        }
    }
    Ok(table)
}

pub struct Repository<'s, C: RepositoryConfig> {
    session: &'s mut Session,
    policy: CompletionPolicy,
    table: String,
    _config: PhantomData<C>,
}

impl<'s, C: RepositoryConfig> Repository<'s, C> {
    /// Bind the repository to `session`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Configuration` if the completion policy or
    /// table declaration is unusable.
    pub fn new(session: &'s mut Session) -> Result<Self, DatabaseError> {
        let policy = CompletionPolicy::resolve(C::AUTO_COMMIT, C::AUTO_FLUSH)?;
        let table = validate_table::<C::Table>()?;
        Ok(Self {
            session,
            policy,
            table,
            _config: PhantomData,
        })
    }

    #[must_use]
    pub const fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The session this repository writes through.
    pub const fn session(&mut self) -> &mut Session {
        &mut *self.session
    }

    fn dialect(&self) -> Dialect {
        self.session.dialect()
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect().quote_ident(ident)
    }

    fn select_list(&self) -> String {
        BASE_COLUMNS
            .iter()
            .copied()
            .chain(C::Table::COLUMNS.iter().map(|c| c.name))
            .map(|name| self.quote(name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn decode_row(row: Row) -> Result<C::Table, DatabaseError> {
        let mut values = row.into_values().into_iter();
        let mut next = |column: &str| {
            values.next().ok_or_else(|| {
                DatabaseError::Query(format!("result row is missing column '{column}'"))
            })
        };

        let id = UuidCodec::decode(next(ID_COLUMN)?, ID_COLUMN)?
            .ok_or_else(|| DatabaseError::integrity(ID_COLUMN, "identifier is null"))?;
        let created_at = TimestampCodec::decode(next(CREATED_AT_COLUMN)?, CREATED_AT_COLUMN)?
            .ok_or_else(|| DatabaseError::integrity(CREATED_AT_COLUMN, "timestamp is null"))?;
        let updated_at = TimestampCodec::decode(next(UPDATED_AT_COLUMN)?, UPDATED_AT_COLUMN)?
            .ok_or_else(|| DatabaseError::integrity(UPDATED_AT_COLUMN, "timestamp is null"))?;

        let mut fields = FieldSet::new();
        for column in C::Table::COLUMNS {
            fields.insert(column.name, decode_column(column, next(column.name)?)?);
        }
        Ok(C::Table::from_fields(
            id,
            Timestamps {
                created_at,
                updated_at,
            },
            fields,
        )?)
    }

    fn insert_statement(&self, entity: &C::Table) -> Result<Statement, DatabaseError> {
        let dialect = self.dialect();
        let ts = entity.timestamps();
        let mut params = vec![
            UuidCodec::encode(Some(entity.id()), dialect),
            TimestampCodec::encode(ts.created_at, dialect),
            TimestampCodec::encode(ts.updated_at, dialect),
        ];
        for column in C::Table::COLUMNS {
            params.push(encode_column(column, entity.field(column.name)?, dialect)?);
        }
        let placeholders = (1..=params.len())
            .map(|n| dialect.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Statement::with_params(
            format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                self.quote(&self.table),
                self.select_list()
            ),
            params,
        ))
    }

    /// `SET` clause and parameters for `fields` plus `updated_at`. The
    /// identifier parameter comes last.
    fn update_parts(
        &self,
        id: Uuid,
        fields: &FieldSet,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(String, Vec<crate::codec::SqlValue>), DatabaseError> {
        let dialect = self.dialect();
        let mut sets = Vec::with_capacity(fields.len() + 1);
        let mut params = Vec::with_capacity(fields.len() + 2);
        for (name, value) in fields.iter() {
            let column = C::Table::column(name).ok_or_else(|| C::Table::unknown_field(name))?;
            params.push(encode_column(column, value.clone(), dialect)?);
            sets.push(format!("{} = {}", self.quote(name), dialect.placeholder(params.len())));
        }
        params.push(TimestampCodec::encode(updated_at, dialect));
        sets.push(format!(
            "{} = {}",
            self.quote(UPDATED_AT_COLUMN),
            dialect.placeholder(params.len())
        ));
        params.push(UuidCodec::encode(Some(id), dialect));
        Ok((sets.join(", "), params))
    }

    fn where_id(&self, n: usize) -> String {
        format!("{} = {}", self.quote(ID_COLUMN), self.dialect().placeholder(n))
    }

    /// Build a new entity from converted create fields.
    fn build(fields: FieldSet) -> Result<C::Table, DatabaseError> {
        for name in fields.names() {
            if C::Table::column(name).is_none() {
                return Err(C::Table::unknown_field(name).into());
            }
        }
        Ok(C::Table::from_fields(Uuid::new_v4(), Timestamps::now(), fields)?)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Fetch one entity. Absence is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns store errors and `IntegrityDecode` for corrupt rows.
    pub async fn get(&mut self, id: Uuid) -> Result<Option<C::Table>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.select_list(),
            self.quote(&self.table),
            self.where_id(1)
        );
        let key = UuidCodec::encode(Some(id), self.dialect());
        let rows = self.session.query(Statement::new(sql).bind(key)).await?;
        rows.into_iter().next().map(Self::decode_row).transpose()
    }

    /// Every entity in the table, in the store's natural order.
    ///
    /// # Errors
    ///
    /// Returns store errors and `IntegrityDecode` for corrupt rows.
    pub async fn get_all(&mut self) -> Result<Vec<C::Table>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM {}",
            self.select_list(),
            self.quote(&self.table)
        );
        let rows = self.session.query(Statement::new(sql)).await?;
        rows.into_iter().map(Self::decode_row).collect()
    }

    /// Convert, construct, persist and return a new entity.
    ///
    /// # Errors
    ///
    /// Returns `Core` for conversion or construction failures and store
    /// errors from the completion policy.
    pub async fn create(&mut self, input: C::Create) -> Result<C::Table, DatabaseError> {
        let fields = C::rules().apply(OperationKind::Create, input.into_fields())?;
        let mut entity = Self::build(fields)?;
        let statement = self.insert_statement(&entity)?;
        self.session.add(statement)?;
        self.consign().await?;
        tracing::debug!(table = %self.table, id = %entity.id(), "created");
        self.refresh(&mut entity).await?;
        Ok(entity)
    }

    /// Create several entities as one batch, in input order.
    ///
    /// Every input is converted and encoded before anything is registered,
    /// so a failing input leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create).
    pub async fn create_bulk<I>(&mut self, inputs: I) -> Result<Vec<C::Table>, DatabaseError>
    where
        I: IntoIterator<Item = C::Create>,
    {
        let rules = C::rules();
        let mut entities = Vec::new();
        let mut statements = Vec::new();
        for input in inputs {
            let entity = Self::build(rules.apply(OperationKind::Create, input.into_fields())?)?;
            statements.push(self.insert_statement(&entity)?);
            entities.push(entity);
        }
        if entities.is_empty() {
            return Ok(entities);
        }

        for statement in statements {
            self.session.add(statement)?;
        }
        self.consign().await?;
        tracing::debug!(table = %self.table, count = entities.len(), "created batch");
        for entity in &mut entities {
            self.refresh(entity).await?;
        }
        Ok(entities)
    }

    /// Fetch, apply the fields set in `input`, persist and return.
    ///
    /// Fields absent from `input` are left untouched; a field set to null is
    /// written as null. An input with no fields leaves the row as is but still
    /// triggers the completion policy.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no row has `id`, `Core` for conversion or
    /// assignment failures and store errors from the completion policy.
    pub async fn update(&mut self, id: Uuid, input: C::Update) -> Result<C::Table, DatabaseError> {
        let mut entity = self
            .get(id)
            .await?
            .ok_or_else(|| DatabaseError::not_found(&self.table, id))?;
        let fields = C::rules().apply(OperationKind::Update, input.into_fields())?;
        if fields.is_empty() {
            self.consign().await?;
            return Ok(entity);
        }

        for (name, value) in fields.iter() {
            entity.set_field(name, value.clone())?;
        }
        let updated_at = entity.timestamps_mut().touch();

        let (sets, params) = self.update_parts(id, &fields, updated_at)?;
        let sql = format!(
            "UPDATE {} SET {sets} WHERE {}",
            self.quote(&self.table),
            self.where_id(params.len())
        );
        self.session.add(Statement::with_params(sql, params))?;
        self.consign().await?;
        tracing::debug!(table = %self.table, %id, fields = fields.len(), "updated");
        self.refresh(&mut entity).await?;
        Ok(entity)
    }

    /// Single-statement update that reads the new row back with `RETURNING`.
    ///
    /// Runs the same update rules as [`update`](Self::update).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the statement matches no row, `Configuration` on
    /// a dialect without `RETURNING`, and otherwise as `update`.
    pub async fn update_returning(
        &mut self,
        id: Uuid,
        input: C::Update,
    ) -> Result<C::Table, DatabaseError> {
        if !self.dialect().supports_returning() {
            return Err(DatabaseError::Configuration(format!(
                "{} does not support UPDATE ... RETURNING",
                self.dialect()
            )));
        }
        let fields = C::rules().apply(OperationKind::Update, input.into_fields())?;
        if fields.is_empty() {
            let entity = self
                .get(id)
                .await?
                .ok_or_else(|| DatabaseError::not_found(&self.table, id))?;
            self.consign().await?;
            return Ok(entity);
        }

        let (sets, params) = self.update_parts(id, &fields, utc_now())?;
        let sql = format!(
            "UPDATE {} SET {sets} WHERE {} RETURNING {}",
            self.quote(&self.table),
            self.where_id(params.len()),
            self.select_list()
        );
        let rows = self
            .session
            .execute_returning(Statement::with_params(sql, params))
            .await?;
        let mut entity = rows
            .into_iter()
            .next()
            .map(Self::decode_row)
            .transpose()?
            .ok_or_else(|| DatabaseError::not_found(&self.table, id))?;

        self.consign().await?;
        tracing::debug!(table = %self.table, %id, fields = fields.len(), "updated (returning)");
        self.refresh(&mut entity).await?;
        Ok(entity)
    }

    /// Remove the entity with `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no row has `id`, including a second delete of
    /// the same identifier.
    pub async fn delete(&mut self, id: Uuid) -> Result<(), DatabaseError> {
        if self.get(id).await?.is_none() {
            return Err(DatabaseError::not_found(&self.table, id));
        }
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            self.quote(&self.table),
            self.where_id(1)
        );
        let key = UuidCodec::encode(Some(id), self.dialect());
        self.session.add(Statement::new(sql).bind(key))?;
        self.consign().await?;
        tracing::debug!(table = %self.table, %id, "deleted");
        Ok(())
    }

    /// Re-read `entity` from the store under the commit policy. Under the
    /// flush policy the in-memory value is kept as is.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the row disappeared.
    pub async fn refresh(&mut self, entity: &mut C::Table) -> Result<(), DatabaseError> {
        if self.policy != CompletionPolicy::Commit {
            return Ok(());
        }
        let id = entity.id();
        *entity = self
            .get(id)
            .await?
            .ok_or_else(|| DatabaseError::not_found(&self.table, id))?;
        Ok(())
    }

    /// Trigger the completion policy for pending writes.
    ///
    /// # Errors
    ///
    /// Returns the store error from the commit or flush unchanged.
    pub async fn consign(&mut self) -> Result<(), DatabaseError> {
        match self.policy {
            CompletionPolicy::Commit => self.session.commit().await,
            CompletionPolicy::Flush => self.session.flush().await,
        }
    }
}
