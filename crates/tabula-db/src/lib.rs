//! # tabula-db
//!
//! Generic relational repository over libSQL.
//!
//! - [`Engine`]: one per process; owns the database handle, dialect,
//!   connection pool and constraint naming convention.
//! - [`Session`]: a unit of work. Lazily checks out a connection and opens a
//!   transaction; [`Session::complete`] commits or rolls back and releases.
//! - [`Repository`]: CRUD over any [`Entity`](tabula_core::Entity), driven by
//!   a [`RepositoryConfig`] that names the entity, its inputs, the
//!   completion policy and the auto-convert rules.
//! - [`codec`]: UUID and timestamp codecs that keep values identical across
//!   dialects with and without native types.
//!
//! The bundled executor speaks the `SQLite` dialect (local files, `:memory:`
//! and remote libSQL servers). Codecs and DDL also cover Postgres and `MySQL`.

pub mod codec;
pub mod engine;
pub mod error;
pub mod inputs;
pub mod pool;
pub mod repos;
pub mod repository;
pub mod rules;
pub mod schema;
pub mod session;

#[cfg(test)]
mod test_support;

pub use codec::{SqlValue, TimestampCodec, UuidCodec};
pub use engine::Engine;
pub use error::DatabaseError;
pub use pool::{PoolOptions, PoolStatus};
pub use repository::{CompletionPolicy, Repository, RepositoryConfig};
pub use rules::{AutoConvertRules, OperationKind, Rule};
pub use session::{Row, Session, SessionState, Statement};
