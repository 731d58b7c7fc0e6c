//! Error types for NPR

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for NPR operations
pub type Result<T> = std::result::Result<T, NprError>;

/// Main error type for NPR
#[derive(Error, Debug)]
pub enum NprError {
    /// Record rejected before reaching the store (bad NPI, missing name, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A different record already owns this NPI
    #[error("Duplicate NPI: {0} already exists in the store")]
    DuplicateKey(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Legacy-schema stores are read-only
    #[error("Store {} uses the legacy schema and is read-only", .0.display())]
    ReadOnlyLegacy(PathBuf),

    #[error("Source '{source_name}' failed: {reason}")]
    SourceFetch { source_name: String, reason: String },

    #[error("Source '{source_name}' timed out after {timeout_ms}ms")]
    SourceTimeout {
        source_name: String,
        timeout_ms: u64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl NprError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a source fetch error
    pub fn source_fetch(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceFetch {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only concerns a single record and should be counted,
    /// not propagated.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::DuplicateKey(_))
    }
}
