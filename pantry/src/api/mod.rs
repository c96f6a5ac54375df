//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers, one generic set per configured resource
//! - **[`models`]**: Query parameters and confirmation bodies
//!
//! Every resource is served under `/api/<name>`; see [`handlers::records::router`].

pub mod handlers;
pub mod models;
