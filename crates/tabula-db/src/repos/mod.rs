//! Concrete repository configurations.
//!
//! Each module declares a zero-sized type implementing `RepositoryConfig`;
//! `Repository<'_, T>` supplies the operations.

pub mod user;

pub use user::UserRepository;
