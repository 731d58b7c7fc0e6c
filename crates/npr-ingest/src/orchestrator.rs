//! Ingestion orchestrator
//!
//! Runs every configured source concurrently, each in its own task under its
//! own timeout, then writes the successful batches into the store one record
//! at a time. A source that fails, times out or panics is reported in the run
//! statistics and never stops the others.
//!
//! Only problems with the store itself (it cannot be initialized, cleared or
//! written at all) abort a run.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use npr_common::types::millis;
use npr_common::{
    FetchOutcome, FetchResult, InsertOutcome, NprError, OperationStats, ProviderRecord, Result,
    SourceReport,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::sources::NamedSource;
use crate::store::ProviderStore;

/// Fans out to a fixed set of named sources and folds the results into a store
pub struct IngestOrchestrator {
    store: Arc<dyn ProviderStore>,
    sources: Vec<NamedSource>,
    fetch_timeout: Duration,
}

impl IngestOrchestrator {
    pub fn new(
        store: Arc<dyn ProviderStore>,
        sources: Vec<NamedSource>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sources,
            fetch_timeout,
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn store(&self) -> &Arc<dyn ProviderStore> {
        &self.store
    }

    /// Fetch every source and insert new providers into the store
    #[instrument(skip(self), fields(sources = self.sources.len(), store = %self.store.describe()))]
    pub async fn fetch_and_store(&self) -> Result<OperationStats> {
        let started = Instant::now();
        let mut stats = OperationStats::new();
        self.ensure_unique_names()?;

        if self.sources.is_empty() {
            info!("No sources configured, nothing to ingest");
            stats.set_elapsed(started.elapsed());
            return Ok(stats);
        }

        self.store.initialize().await.map_err(|e| {
            error!(error = %e, "Failed to initialize provider store");
            e
        })?;

        for result in self.fetch_all().await {
            if let Some(err) = result.error() {
                warn!(source = %result.source, error = %err, "Source did not complete");
            }

            let report = match result.outcome {
                FetchOutcome::Success(records) => self.store_batch(&result.source, records).await?,
                FetchOutcome::Failure(reason) => SourceReport::Failed { error: reason },
                FetchOutcome::Timeout(ceiling) => SourceReport::TimedOut {
                    timeout_ms: millis(ceiling),
                },
            };
            stats.record(result.source, report);
        }

        stats.set_elapsed(started.elapsed());
        info!(
            run_id = %stats.run_id,
            succeeded = stats.sources_succeeded,
            failed = stats.sources_failed,
            stored = stats.providers_stored,
            skipped = stats.providers_skipped,
            elapsed_ms = stats.elapsed_ms,
            "Ingestion run complete"
        );

        Ok(stats)
    }

    /// Empty the store, then run [`fetch_and_store`](Self::fetch_and_store).
    ///
    /// If the store cannot be cleared no source is fetched.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<OperationStats> {
        self.ensure_unique_names()?;
        self.store.initialize().await?;
        self.store.clear().await.map_err(|e| {
            error!(error = %e, "Failed to clear provider store, refresh aborted");
            e
        })?;
        info!(store = %self.store.describe(), "Store cleared for refresh");

        self.fetch_and_store().await
    }

    /// Fetch every source concurrently and return one result per source.
    ///
    /// Results come back in configured source order whatever order the
    /// fetches finished in.
    pub async fn fetch_all(&self) -> Vec<FetchResult> {
        let concurrency = self.sources.len().max(1);
        let ceiling = self.fetch_timeout;

        let tasks: Vec<_> = self
            .sources
            .iter()
            .enumerate()
            .map(|(position, named)| {
                let source = Arc::clone(&named.source);
                let span = info_span!("fetch_source", source = %named.name);
                let handle = tokio::spawn(
                    async move { tokio::time::timeout(ceiling, source.fetch()).await }
                        .instrument(span),
                );
                (position, named.name.clone(), handle)
            })
            .collect();

        let mut results: Vec<(usize, FetchResult)> = stream::iter(tasks)
            .map(|(position, name, handle)| async move {
                let result = match handle.await {
                    Ok(Ok(Ok(records))) => {
                        debug!(source = %name, fetched = records.len(), "Source fetched");
                        FetchResult::success(name, records)
                    },
                    Ok(Ok(Err(e))) => FetchResult::failure(name, format!("{:#}", e)),
                    Ok(Err(_elapsed)) => FetchResult::timeout(name, ceiling),
                    Err(join_error) if join_error.is_panic() => {
                        FetchResult::failure(name, "fetch task panicked")
                    },
                    Err(join_error) => {
                        FetchResult::failure(name, format!("fetch task aborted: {}", join_error))
                    },
                };
                (position, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.sort_by_key(|(position, _)| *position);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// Source names key the per-source breakdown, so each must be distinct
    fn ensure_unique_names(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.sources.len());
        match self.sources.iter().find(|s| !seen.insert(s.name.as_str())) {
            Some(dup) => Err(NprError::Config(format!(
                "source name '{}' is configured more than once",
                dup.name
            ))),
            None => Ok(()),
        }
    }

    /// Insert one source's batch record by record
    async fn store_batch(&self, source: &str, records: Vec<ProviderRecord>) -> Result<SourceReport> {
        let fetched = records.len();
        let (mut stored, mut skipped, mut failed) = (0, 0, 0);
        let now = Utc::now();

        for mut record in records {
            if record.source.is_empty() {
                record.source = source.to_string();
            }
            record.created_at = record.created_at.or(Some(now));
            record.updated_at = record.updated_at.or(Some(now));

            match self.store.insert_if_missing(&record).await {
                Ok(InsertOutcome::Inserted) => stored += 1,
                Ok(InsertOutcome::AlreadyExists) => skipped += 1,
                Err(e) if e.is_record_level() => {
                    debug!(source, npi = %record.npi, error = %e, "Rejected provider");
                    failed += 1;
                },
                Err(e) => {
                    error!(source, npi = %record.npi, error = %e, "Provider store unwritable");
                    return Err(e);
                },
            }
        }

        if failed > 0 {
            warn!(source, failed, "Some providers were rejected");
        }
        info!(source, fetched, stored, skipped, failed, "Source stored");

        Ok(SourceReport::Completed {
            fetched,
            stored,
            skipped,
            failed,
        })
    }
}

impl std::fmt::Debug for IngestOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestOrchestrator")
            .field("store", &self.store.describe())
            .field("sources", &self.source_names())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}
