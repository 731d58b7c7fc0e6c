//! Common types used across NPR

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{NprError, Result};
use crate::npi::validate_npi;

// ============================================================================
// Provider Records
// ============================================================================

/// A healthcare provider as held in the registry store.
///
/// `npi` is the store key. Records read back from disk are not re-validated,
/// so a record coming out of a store may carry a malformed NPI if the file
/// was edited by hand; records going *in* pass through [`ProviderRecord::validate`].
///
/// # Examples
///
/// ```rust
/// use npr_common::types::ProviderRecord;
///
/// let record = ProviderRecord::new("1234567893", "Jane Doe")
///     .with_specialty("Cardiology")
///     .with_source("manual");
/// assert!(record.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderRecord {
    /// Ten digit National Provider Identifier
    pub npi: String,

    /// Provider or organisation display name
    pub name: String,

    /// Credential text (MD, DO, NP, ...)
    #[serde(default)]
    pub credential: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub city: String,

    #[serde(default)]
    pub state: String,

    #[serde(default)]
    pub postal_code: String,

    /// Specialty or taxonomy description
    #[serde(default)]
    pub specialty: String,

    /// Name of the source that produced the record
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProviderRecord {
    /// Create a record with only the required fields set
    pub fn new(npi: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            npi: npi.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_location(
        mut self,
        address: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        self.address = address.into();
        self.city = city.into();
        self.state = state.into();
        self.postal_code = postal_code.into();
        self
    }

    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = specialty.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Stamp both timestamps with `now`
    pub fn with_timestamps(mut self, now: DateTime<Utc>) -> Self {
        self.created_at = Some(now);
        self.updated_at = Some(now);
        self
    }

    /// Check the record may be admitted to a store
    pub fn validate(&self) -> Result<()> {
        validate_npi(&self.npi)?;

        if self.name.trim().is_empty() {
            return Err(NprError::validation(format!(
                "Provider {} is missing a name",
                self.npi
            )));
        }

        Ok(())
    }

    /// Case-insensitive substring match against the provider name
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Outcome of an insert-if-missing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

impl InsertOutcome {
    pub fn is_inserted(self) -> bool {
        self == InsertOutcome::Inserted
    }
}

/// Aggregate counts reported by a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: usize,
    /// Record count per source tag (empty tag for records without a source)
    pub by_source: BTreeMap<String, usize>,
}

// ============================================================================
// Fetch Results
// ============================================================================

/// What happened when a single source was fetched
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(Vec<ProviderRecord>),
    Failure(String),
    Timeout(Duration),
}

/// Result of fetching one source during an orchestrator run
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub source: String,
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn success(source: impl Into<String>, records: Vec<ProviderRecord>) -> Self {
        Self {
            source: source.into(),
            outcome: FetchOutcome::Success(records),
        }
    }

    pub fn failure(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: FetchOutcome::Failure(reason.into()),
        }
    }

    pub fn timeout(source: impl Into<String>, ceiling: Duration) -> Self {
        Self {
            source: source.into(),
            outcome: FetchOutcome::Timeout(ceiling),
        }
    }

    /// The error this result represents, if it is not a success
    pub fn error(&self) -> Option<NprError> {
        match &self.outcome {
            FetchOutcome::Success(_) => None,
            FetchOutcome::Failure(reason) => Some(NprError::source_fetch(&self.source, reason)),
            FetchOutcome::Timeout(ceiling) => Some(NprError::SourceTimeout {
                source_name: self.source.clone(),
                timeout_ms: millis(*ceiling),
            }),
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Operation Statistics
// ============================================================================

/// Per-source line of an [`OperationStats`] breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceReport {
    Completed {
        fetched: usize,
        stored: usize,
        /// Records whose NPI was already present
        skipped: usize,
        failed: usize,
    },
    Failed {
        error: String,
    },
    TimedOut {
        timeout_ms: u64,
    },
}

impl SourceReport {
    pub fn is_success(&self) -> bool {
        matches!(self, SourceReport::Completed { .. })
    }
}

/// Statistics for one orchestrator run.
///
/// Stats are folded from per-source reports that arrive in completion order,
/// which is arbitrary. Every counter is a plain sum and the breakdown is keyed
/// by source name, so [`OperationStats::merge`] gives the same answer whatever
/// order the reports came in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStats {
    pub run_id: Uuid,
    pub sources_processed: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub providers_fetched: usize,
    pub providers_stored: usize,
    pub providers_skipped: usize,
    pub providers_failed: usize,
    pub per_source: BTreeMap<String, SourceReport>,
    /// Wall-clock duration of the run in milliseconds
    pub elapsed_ms: u64,
}

impl Default for OperationStats {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationStats {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            sources_processed: 0,
            sources_succeeded: 0,
            sources_failed: 0,
            providers_fetched: 0,
            providers_stored: 0,
            providers_skipped: 0,
            providers_failed: 0,
            per_source: BTreeMap::new(),
            elapsed_ms: 0,
        }
    }

    /// Fold one source's report into the totals
    pub fn record(&mut self, source: impl Into<String>, report: SourceReport) {
        self.sources_processed += 1;

        match &report {
            SourceReport::Completed {
                fetched,
                stored,
                skipped,
                failed,
            } => {
                self.sources_succeeded += 1;
                self.providers_fetched += fetched;
                self.providers_stored += stored;
                self.providers_skipped += skipped;
                self.providers_failed += failed;
            },
            SourceReport::Failed { .. } | SourceReport::TimedOut { .. } => {
                self.sources_failed += 1;
            },
        }

        self.per_source.insert(source.into(), report);
    }

    /// Combine two partial stats. The run id and elapsed time of `self` win.
    pub fn merge(mut self, other: OperationStats) -> Self {
        self.sources_processed += other.sources_processed;
        self.sources_succeeded += other.sources_succeeded;
        self.sources_failed += other.sources_failed;
        self.providers_fetched += other.providers_fetched;
        self.providers_stored += other.providers_stored;
        self.providers_skipped += other.providers_skipped;
        self.providers_failed += other.providers_failed;
        self.per_source.extend(other.per_source);
        self
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Names of the sources that failed or timed out
    pub fn failed_sources(&self) -> Vec<&str> {
        self.per_source
            .iter()
            .filter(|(_, report)| !report.is_success())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Ingestion Summary:\n\
             - Sources processed: {}\n\
             - Sources succeeded: {}\n\
             - Sources failed: {}\n\
             - Providers fetched: {}\n\
             - Providers stored: {}\n\
             - Providers skipped (already present): {}\n\
             - Providers failed: {}\n\
             - Elapsed: {:.2}s",
            self.sources_processed,
            self.sources_succeeded,
            self.sources_failed,
            self.providers_fetched,
            self.providers_stored,
            self.providers_skipped,
            self.providers_failed,
            self.elapsed().as_secs_f64()
        );

        for (name, report) in &self.per_source {
            let line = match report {
                SourceReport::Completed {
                    fetched,
                    stored,
                    skipped,
                    failed,
                } => format!(
                    "\n  {}: fetched {}, stored {}, skipped {}, failed {}",
                    name, fetched, stored, skipped, failed
                ),
                SourceReport::Failed { error } => format!("\n  {}: error: {}", name, error),
                SourceReport::TimedOut { timeout_ms } => {
                    format!("\n  {}: timed out after {}ms", name, timeout_ms)
                },
            };
            out.push_str(&line);
        }

        out
    }
}
