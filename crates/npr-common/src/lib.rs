//! NPR Common Library
//!
//! Shared types, utilities, and error handling for the NPR provider registry.
//!
//! # Overview
//!
//! - **Error Handling**: [`NprError`] and the [`Result`] alias
//! - **Identifiers**: NPI check digit validation and generation
//! - **Types**: provider records, fetch results and run statistics
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use npr_common::npi::{generate_npi, is_valid_npi};
//!
//! let npi = generate_npi("123456789").unwrap_or_default();
//! assert!(is_valid_npi(&npi));
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod npi;
pub mod types;

// Re-export commonly used types
pub use error::{NprError, Result};
pub use types::{
    FetchOutcome, FetchResult, InsertOutcome, OperationStats, ProviderRecord, SourceReport,
    StoreStats,
};
