//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with SQLite.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries built from a resource schema)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - records and field values)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Mutating handlers create repositories from a transaction so that a read-modify-write
//! (like an update) is applied as a unit:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut repo = Records::new(&mut tx, &schema);
//! let record = repo.update(id, &update).await?;
//! tx.commit().await?;
//! ```
//!
//! Read-only handlers acquire a plain connection instead.

pub mod errors;
pub mod handlers;
pub mod models;
pub mod tables;
