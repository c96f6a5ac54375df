//! Database record models.
//!
//! Resources are described at runtime, so rows are read into a generic [`records::Record`]
//! instead of one `FromRow` struct per table.

pub mod records;
