//! Provider sources
//!
//! A source produces a batch of provider records on demand. It knows nothing
//! about storage or about other sources; the orchestrator runs all of them
//! concurrently and owns timeouts and failure handling.

use anyhow::Result;
use async_trait::async_trait;
use npr_common::ProviderRecord;
use std::fmt;
use std::sync::Arc;

pub mod archive;
pub mod decompression;
pub mod synthetic;

pub use archive::{fetcher_for, ArchiveFetcher, ArchiveSource, FileArchiveFetcher, HttpArchiveFetcher};
pub use synthetic::SyntheticSource;

/// Anything that can produce provider records
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// Fetch one batch of records. Called at most once per run.
    async fn fetch(&self) -> Result<Vec<ProviderRecord>>;
}

/// A source paired with the name used in logs, stats and the record source tag
#[derive(Clone)]
pub struct NamedSource {
    pub name: String,
    pub source: Arc<dyn ProviderSource>,
}

impl NamedSource {
    pub fn new(name: impl Into<String>, source: Arc<dyn ProviderSource>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

impl fmt::Debug for NamedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedSource").field("name", &self.name).finish()
    }
}
