//! Integration tests for the ingestion orchestrator
//!
//! Sources here are small in-test adapters so each scenario controls exactly
//! what is fetched, how long it takes and how it fails.

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::BoxStream;
use npr_common::npi::generate_npi;
use npr_common::{InsertOutcome, NprError, ProviderRecord, Result, SourceReport, StoreStats};
use npr_ingest::sources::{NamedSource, ProviderSource, SyntheticSource};
use npr_ingest::store::{collect_all, CsvProviderStore, ProviderStore};
use npr_ingest::IngestOrchestrator;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn npi(base: u32) -> String {
    generate_npi(&format!("{:09}", base)).expect("valid base")
}

/// Returns a fixed batch, optionally after a delay
struct FixedSource {
    records: Vec<ProviderRecord>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl FixedSource {
    fn new(records: Vec<ProviderRecord>) -> Self {
        Self {
            records,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ProviderSource for FixedSource {
    async fn fetch(&self) -> anyhow::Result<Vec<ProviderRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.records.clone())
    }
}

struct FailingSource;

#[async_trait]
impl ProviderSource for FailingSource {
    async fn fetch(&self) -> anyhow::Result<Vec<ProviderRecord>> {
        Err(anyhow!("connection refused"))
    }
}

fn named(name: &str, source: impl ProviderSource + 'static) -> NamedSource {
    NamedSource::new(name, Arc::new(source))
}

fn csv_store(dir: &TempDir) -> Arc<CsvProviderStore> {
    Arc::new(CsvProviderStore::at_path(dir.path().join("providers.csv")))
}

fn records(bases: std::ops::Range<u32>, source: &str) -> Vec<ProviderRecord> {
    bases
        .map(|base| ProviderRecord::new(npi(base), format!("Provider {}", base)).with_source(source))
        .collect()
}

#[tokio::test]
async fn test_all_sources_succeed() {
    let dir = TempDir::new().unwrap();
    let orch = IngestOrchestrator::new(
        csv_store(&dir),
        vec![
            named("east", SyntheticSource::new("east", 100_000_000, 10)),
            named("west", SyntheticSource::new("west", 200_000_000, 15)),
        ],
        Duration::from_secs(5),
    );

    let stats = orch.fetch_and_store().await.unwrap();

    assert_eq!(stats.sources_processed, 2);
    assert_eq!(stats.sources_succeeded, 2);
    assert_eq!(stats.sources_failed, 0);
    assert_eq!(stats.providers_fetched, 25);
    assert_eq!(stats.providers_stored, 25);
    assert_eq!(stats.providers_failed, 0);
    assert!(stats.failed_sources().is_empty());
}

#[tokio::test]
async fn test_two_sources_three_records_each() {
    let dir = TempDir::new().unwrap();
    let store = csv_store(&dir);
    let orch = IngestOrchestrator::new(
        store.clone(),
        vec![
            named("a", FixedSource::new(records(1..4, "a"))),
            named("b", FixedSource::new(records(10..13, "b"))),
        ],
        Duration::from_secs(5),
    );

    let stats = orch.fetch_and_store().await.unwrap();

    assert_eq!(stats.sources_processed, 2);
    assert_eq!(stats.providers_stored, 6);
    assert_eq!(stats.providers_failed, 0);
    assert_eq!(store.load_all().unwrap().len(), 6);
}

#[tokio::test]
async fn test_one_failing_source_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    let store = csv_store(&dir);
    let orch = IngestOrchestrator::new(
        store.clone(),
        vec![
            named("good", FixedSource::new(records(1..6, "good"))),
            named("bad", FailingSource),
        ],
        Duration::from_secs(5),
    );

    let stats = orch.fetch_and_store().await.unwrap();

    assert_eq!(stats.sources_failed, 1);
    assert_eq!(stats.failed_sources(), vec!["bad"]);
    assert!(matches!(
        &stats.per_source["bad"],
        SourceReport::Failed { error } if error.contains("connection refused")
    ));
    assert_eq!(stats.providers_stored, 5);
    assert_eq!(store.load_all().unwrap().len(), 5);
}

#[tokio::test]
async fn test_all_sources_failing_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let orch = IngestOrchestrator::new(
        csv_store(&dir),
        vec![named("x", FailingSource), named("y", FailingSource)],
        Duration::from_secs(5),
    );

    let stats = orch.fetch_and_store().await.unwrap();
    assert_eq!(stats.sources_failed, 2);
    assert_eq!(stats.providers_stored, 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_times_out_alone() {
    let dir = TempDir::new().unwrap();
    let store = csv_store(&dir);
    let orch = IngestOrchestrator::new(
        store.clone(),
        vec![
            named(
                "slow",
                FixedSource::new(records(1..3, "slow")).delayed(Duration::from_secs(60)),
            ),
            named(
                "quick",
                FixedSource::new(records(5..8, "quick")).delayed(Duration::from_millis(10)),
            ),
        ],
        Duration::from_secs(2),
    );

    let stats = orch.fetch_and_store().await.unwrap();

    assert_eq!(
        stats.per_source["slow"],
        SourceReport::TimedOut { timeout_ms: 2_000 }
    );
    assert!(stats.per_source["quick"].is_success());
    assert_eq!(stats.providers_stored, 3);
    assert!(store.load_all().unwrap().iter().all(|r| r.source == "quick"));
}

#[tokio::test(start_paused = true)]
async fn test_sub_second_timeout_keeps_its_milliseconds() {
    let dir = TempDir::new().unwrap();
    let orch = IngestOrchestrator::new(
        csv_store(&dir),
        vec![named(
            "slow",
            FixedSource::new(records(1..3, "slow")).delayed(Duration::from_secs(5)),
        )],
        Duration::from_millis(250),
    );

    let stats = orch.fetch_and_store().await.unwrap();

    assert_eq!(
        stats.per_source["slow"],
        SourceReport::TimedOut { timeout_ms: 250 }
    );
    assert!(stats.summary().contains("timed out after 250ms"));
}

#[tokio::test]
async fn test_duplicate_source_names_abort_before_fetching() {
    let dir = TempDir::new().unwrap();
    let store = csv_store(&dir);
    let orch = IngestOrchestrator::new(
        store.clone(),
        vec![
            named("dup", FixedSource::new(records(1..4, "dup"))),
            named("dup", SyntheticSource::new("dup", 100, 2).failing("boom")),
        ],
        Duration::from_secs(5),
    );

    let err = orch.fetch_and_store().await.unwrap_err();

    assert!(matches!(err, NprError::Config(ref msg) if msg.contains("dup")));
    assert!(store.load_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_zero_sources_yields_empty_stats() {
    let dir = TempDir::new().unwrap();
    let store = csv_store(&dir);
    let orch = IngestOrchestrator::new(store.clone(), Vec::new(), Duration::from_secs(5));

    let stats = orch.fetch_and_store().await.unwrap();

    assert_eq!(stats.sources_processed, 0);
    assert_eq!(stats.providers_fetched, 0);
    assert!(stats.per_source.is_empty());
}

#[tokio::test]
async fn test_second_run_skips_existing_providers() {
    let dir = TempDir::new().unwrap();
    let orch = IngestOrchestrator::new(
        csv_store(&dir),
        vec![named("a", FixedSource::new(records(1..5, "a")))],
        Duration::from_secs(5),
    );

    orch.fetch_and_store().await.unwrap();
    let again = orch.fetch_and_store().await.unwrap();

    assert_eq!(again.providers_fetched, 4);
    assert_eq!(again.providers_stored, 0);
    assert_eq!(again.providers_skipped, 4);
}

#[tokio::test]
async fn test_bad_records_are_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut batch = records(1..4, "mixed");
    batch.insert(1, ProviderRecord::new("1234567890", "Bad Check Digit"));
    batch.push(ProviderRecord::new(npi(50), ""));

    let orch = IngestOrchestrator::new(
        csv_store(&dir),
        vec![named("mixed", FixedSource::new(batch))],
        Duration::from_secs(5),
    );

    let stats = orch.fetch_and_store().await.unwrap();
    assert_eq!(
        stats.per_source["mixed"],
        SourceReport::Completed {
            fetched: 5,
            stored: 3,
            skipped: 0,
            failed: 2,
        }
    );
}

#[tokio::test]
async fn test_refresh_replaces_previous_contents() {
    let dir = TempDir::new().unwrap();
    let store = csv_store(&dir);
    for record in records(100..110, "old") {
        store.insert_if_missing(&record).unwrap();
    }

    let orch = IngestOrchestrator::new(
        store.clone(),
        vec![named("new", FixedSource::new(records(1..4, "new")))],
        Duration::from_secs(5),
    );
    let stats = orch.refresh().await.unwrap();

    assert_eq!(stats.providers_stored, 3);
    let stored = collect_all(store.as_ref()).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|r| r.source == "new"));
}

/// Store whose `clear` always fails; everything else is unreachable in the test
struct UnclearableStore {
    inserts: AtomicUsize,
}

#[async_trait]
impl ProviderStore for UnclearableStore {
    fn describe(&self) -> String {
        "unclearable".to_string()
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn list_all(&self) -> BoxStream<'_, Result<ProviderRecord>> {
        Box::pin(futures::stream::empty())
    }

    async fn find(&self, _npi: &str) -> Result<Option<ProviderRecord>> {
        Ok(None)
    }

    async fn search(&self, _text: &str) -> Result<Vec<ProviderRecord>> {
        Ok(Vec::new())
    }

    async fn insert_if_missing(&self, _record: &ProviderRecord) -> Result<InsertOutcome> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(InsertOutcome::Inserted)
    }

    async fn overwrite_all(&self, _records: &[ProviderRecord]) -> Result<()> {
        Ok(())
    }

    async fn update(&self, _npi: &str, _record: &ProviderRecord) -> Result<bool> {
        Ok(false)
    }

    async fn delete(&self, _npi: &str) -> Result<bool> {
        Ok(false)
    }

    async fn clear(&self) -> Result<()> {
        Err(NprError::Storage(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only volume",
        )))
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats::default())
    }
}

#[tokio::test]
async fn test_refresh_stops_when_clear_fails() {
    let store = Arc::new(UnclearableStore {
        inserts: AtomicUsize::new(0),
    });
    let source = FixedSource::new(records(1..3, "a"));
    let calls = source.calls.clone();

    let orch = IngestOrchestrator::new(
        store.clone(),
        vec![named("a", source)],
        Duration::from_secs(5),
    );

    let err = orch.refresh().await.unwrap_err();
    assert!(matches!(err, NprError::Storage(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_legacy_store_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let store = csv_store(&dir);
    std::fs::write(
        store.path(),
        format!(
            "npi,name,credential,phone,address,city,state,postal_code,specialty\n{},Old,,,,,,,\n",
            npi(1)
        ),
    )
    .unwrap();

    let orch = IngestOrchestrator::new(
        store.clone(),
        vec![named("a", FixedSource::new(records(5..7, "a")))],
        Duration::from_secs(5),
    );

    let err = orch.fetch_and_store().await.unwrap_err();
    assert!(matches!(err, NprError::ReadOnlyLegacy(_)));
    assert_eq!(store.load_all().unwrap().len(), 1);
}
