//! Example entities.
//!
//! Each entity maps to a table through the [`Entity`](crate::entity::Entity)
//! contract. Only `User` ships here; real applications define their own.

mod user;

pub use user::User;
