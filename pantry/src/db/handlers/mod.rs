//! Repository implementations for database access.
//!
//! Repositories wrap a SQLx connection or transaction, build their queries and bind their
//! parameters, and return models from [`crate::db::models`]. A single [`Records`] repository
//! serves every configured resource.

pub mod records;
pub mod repository;

pub use records::{RecordFilter, Records};
pub use repository::Repository;
