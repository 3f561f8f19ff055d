//! Create and update input types for repository operations.
//!
//! Create inputs carry every field. Update inputs use `Option` fields and only
//! `Some` fields reach the field set, so only they generate SET clauses;
//! `Option<Option<T>>` separates "leave unchanged" from "set to null".

pub mod user;

pub use user::{UserCreate, UserUpdate, UserUpdateBuilder};
