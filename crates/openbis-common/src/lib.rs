//! openBIS Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the openBIS server workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Codes**: normalization and validation of entity codes
//! - **Perm ids**: permanent identifier generation
//! - **Types**: enums shared by the API and the persistence layer
//! - **Logging**: tracing subscriber setup used by every binary
//!
//! # Example
//!
//! ```
//! use openbis_common::code::normalize_code;
//! use openbis_common::types::EntityKind;
//!
//! assert_eq!(normalize_code("my_sample").unwrap(), "MY_SAMPLE");
//! assert_eq!(EntityKind::DataSet.as_str(), "DATA_SET");
//! ```

pub mod code;
pub mod error;
pub mod logging;
pub mod perm_id;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
