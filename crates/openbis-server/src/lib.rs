//! openBIS Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! HTTP server for a registry of spaces, projects, experiments, samples,
//! data sets and materials together with their types, vocabularies and
//! access rules.
//!
//! # Architecture
//!
//! Every feature is a vertical slice under [`features`]:
//!
//! - **Commands** (write operations) run in one transaction per batch and
//!   return the perm ids or technical ids of what they touched
//! - **Queries** (read operations) filter by the caller's read scope and load
//!   relations only when the fetch options ask for them
//!
//! Each call writes one line to the [`access_log`]. Writes to indexed
//! entities append to an outbox that the [`index`] worker drains into the
//! in-process search index.
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP routing and extractors
//! - **SQLx**: SQLite metadata store and migrations
//! - **Tower**: middleware (tracing, CORS, compression)

pub mod access_log;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod index;
pub mod middleware;

// Re-export commonly used types
pub use error::{ApiError, ApiResult};
