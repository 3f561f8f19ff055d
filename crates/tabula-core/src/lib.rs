//! # tabula-core
//!
//! Foundational types shared by all Tabula crates:
//! - [`Value`](value::Value), the dialect-independent in-memory field value
//! - [`Dialect`](dialect::Dialect) and its native type capabilities
//! - table naming and the constraint [`NamingConvention`](naming::NamingConvention)
//! - the [`Entity`](entity::Entity) contract, column schema and audit timestamps
//! - the example [`User`](entities::User) entity
//! - [`CoreError`](errors::CoreError)

pub mod dialect;
pub mod entities;
pub mod entity;
pub mod errors;
pub mod naming;
pub mod value;

pub use dialect::Dialect;
pub use entity::{Column, ColumnType, Entity, FieldSet, IntoFields, Timestamps};
pub use errors::CoreError;
pub use naming::NamingConvention;
pub use value::{FromValue, Value};
