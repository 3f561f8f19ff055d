//! Process-wide database engine.
//!
//! An [`Engine`] is built once at startup from explicit configuration and
//! cloned freely; clones share one libSQL database handle and one pool.

use std::sync::Arc;

use libsql::Builder;
use tabula_config::DatabaseConfig;
use tabula_core::{Dialect, Entity, NamingConvention};

use crate::error::DatabaseError;
use crate::pool::{ConnectionPool, PoolOptions, PoolStatus};
use crate::schema;
use crate::session::{Session, Statement};

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    pool: Arc<ConnectionPool>,
    dialect: Dialect,
    naming: NamingConvention,
}

impl Engine {
    fn from_database(db: libsql::Database, options: PoolOptions, naming: NamingConvention) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                pool: Arc::new(ConnectionPool::new(db, options)),
                dialect: Dialect::Sqlite,
                naming,
            }),
        }
    }

    /// Open a local database file (or `":memory:"`).
    ///
    /// In-memory databases are private to each connection, so anything that
    /// spans sessions needs a file.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn open_local(path: &str, options: PoolOptions) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        tracing::info!(path, pool_size = options.size, "opened local database");
        Ok(Self::from_database(db, options, NamingConvention::default()))
    }

    /// Connect to a remote libSQL server.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the remote handle cannot be built.
    pub async fn open_remote(
        url: &str,
        auth_token: &str,
        options: PoolOptions,
    ) -> Result<Self, DatabaseError> {
        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await?;
        tracing::info!(url, pool_size = options.size, "opened remote database");
        Ok(Self::from_database(db, options, NamingConvention::default()))
    }

    /// Build an engine from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Configuration` for invalid settings or a
    /// dialect this engine cannot execute against.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        config
            .validate()
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?;
        match config.dialect() {
            Some(Dialect::Sqlite) => {}
            other => {
                return Err(DatabaseError::Configuration(format!(
                    "no executor for driver '{}' (dialect {})",
                    config.driver,
                    other.map_or_else(|| "unknown".to_string(), |d| d.to_string())
                )));
            }
        }

        tracing::debug!(uri = %config.redacted_uri(), "building engine from config");
        let options = PoolOptions::from_config(config);
        let engine = match config.remote_url() {
            Some(url) => Self::open_remote(&url, &config.auth_token, options).await?,
            None => Self::open_local(&config.name, options).await?,
        };
        Ok(engine.with_naming(config.naming.clone()))
    }

    /// Replace the constraint naming convention. Must be called before the
    /// engine is cloned.
    #[must_use]
    pub fn with_naming(self, naming: NamingConvention) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.naming = naming;
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(shared) => {
                tracing::warn!("engine already shared, keeping existing naming convention");
                Self { inner: shared }
            }
        }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    #[must_use]
    pub fn naming(&self) -> &NamingConvention {
        &self.inner.naming
    }

    pub(crate) fn pool(&self) -> &Arc<ConnectionPool> {
        &self.inner.pool
    }

    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.inner.pool.status()
    }

    /// A fresh idle session. Nothing is checked out until first use.
    #[must_use]
    pub fn session(&self) -> Session {
        Session::new(self.clone())
    }

    /// Run `work` inside a new session and complete it: commit when it
    /// returns `Ok`, roll back when it returns `Err`, close either way.
    ///
    /// ```no_run
    /// # use tabula_db::{Engine, DatabaseError, Repository, Session};
    /// # use tabula_db::repos::UserRepository;
    /// # use tabula_db::inputs::UserCreate;
    /// # async fn demo(engine: &Engine) -> Result<(), DatabaseError> {
    /// let user = engine
    ///     .unit_of_work(async |session: &mut Session| -> Result<_, DatabaseError> {
    ///         let mut users = Repository::<UserRepository>::new(session)?;
    ///         users.create(UserCreate::new("alice")).await
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `work`'s error, or the commit/rollback failure.
    pub async fn unit_of_work<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut Session) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let mut session = self.session();
        let result = work(&mut session).await;
        session.complete(result).await
    }

    /// Create the table and indexes for `E` if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Migration` if any statement fails.
    pub async fn create_table<E: Entity>(&self) -> Result<(), DatabaseError> {
        let table = E::table_name();
        let statements = schema::create_table_sql::<E>(self.dialect(), self.naming());
        let mut session = self.session();
        let mut result = Ok(());
        for sql in statements {
            if let Err(e) = session.execute(Statement::new(sql)).await {
                result = Err(DatabaseError::Migration(format!("{table}: {e}")));
                break;
            }
        }
        session.complete(result).await?;
        tracing::debug!(table, "ensured table");
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("dialect", &self.inner.dialect)
            .field("pool", &self.inner.pool.status())
            .finish_non_exhaustive()
    }
}
