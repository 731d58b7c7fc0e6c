//! Provider storage
//!
//! [`ProviderStore`] is the contract the orchestrator and the CLI are written
//! against. Two implementations exist:
//!
//! - [`CsvProviderStore`]: a single CSV file, rewritten as a whole on edit
//! - `SqliteProviderStore`: a SQLite table (requires the `database` feature)
//!
//! Both reject duplicate NPIs on insert. Neither ever replaces an existing
//! record from `insert_if_missing`.

use async_trait::async_trait;
use futures::stream::{BoxStream, TryStreamExt};
use npr_common::{InsertOutcome, ProviderRecord, Result, StoreStats};

pub mod csv_store;
#[cfg(feature = "database")]
pub mod sqlite;
pub mod tabular;

pub use csv_store::{CsvProviderStore, ProviderRecords};
#[cfg(feature = "database")]
pub use sqlite::SqliteProviderStore;
pub use tabular::Schema;

/// Durable, deduplicated provider storage keyed by NPI
#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// Short description for logs (backend and location)
    fn describe(&self) -> String;

    /// Create the backing storage if it does not exist. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Stream every record in storage order. Each call starts a fresh pass.
    fn list_all(&self) -> BoxStream<'_, Result<ProviderRecord>>;

    async fn find(&self, npi: &str) -> Result<Option<ProviderRecord>>;

    /// Case-insensitive substring search on the provider name
    async fn search(&self, text: &str) -> Result<Vec<ProviderRecord>>;

    /// Store `record` unless its NPI is already present. Validates first.
    async fn insert_if_missing(&self, record: &ProviderRecord) -> Result<InsertOutcome>;

    /// Atomically replace the entire contents with `records`
    async fn overwrite_all(&self, records: &[ProviderRecord]) -> Result<()>;

    /// Replace the record stored under `npi`; `false` if there is none
    async fn update(&self, npi: &str, record: &ProviderRecord) -> Result<bool>;

    /// Remove the record stored under `npi`; `false` if there is none
    async fn delete(&self, npi: &str) -> Result<bool>;

    /// Remove every record
    async fn clear(&self) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Drain [`ProviderStore::list_all`] into a vector
pub async fn collect_all(store: &dyn ProviderStore) -> Result<Vec<ProviderRecord>> {
    store.list_all().try_collect().await
}
