//! Ingestion configuration
//!
//! Everything is resolved once from the environment by [`IngestConfig::from_env`]
//! and then passed around explicitly. Nothing re-reads the environment later.

use npr_common::{NprError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::sources::{archive::fetcher_for, ArchiveSource, NamedSource, SyntheticSource};

/// Default directory holding the provider store
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default store file name inside the data directory
pub const DEFAULT_STORE_FILE: &str = "providers.csv";

/// Default per-source fetch ceiling
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Where the provider store lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub file_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            file_name: DEFAULT_STORE_FILE.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Full path of the CSV store file
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }
}

/// Settings for the built-in synthetic sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Records produced per source
    pub count: usize,
    /// Simulated network latency per fetch
    pub latency_ms: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            count: 25,
            latency_ms: 250,
        }
    }
}

/// Settings for the NPPES-style archive source.
///
/// `url` may be `http(s)://`, `file://` or a plain local path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub url: String,
    /// Number of valid rows kept from the archive
    pub sample_size: usize,
}

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub store: StoreConfig,
    pub fetch_timeout_secs: u64,
    pub synthetic: SyntheticConfig,
    pub archive: Option<ArchiveConfig>,
    /// SQLite URL; when set (and the `database` feature is on) it replaces the CSV store
    pub database_url: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            synthetic: SyntheticConfig::default(),
            archive: None,
            database_url: None,
        }
    }
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    ///
    /// - `NPR_DATA_DIR`: store directory (default `./data`)
    /// - `NPR_STORE_FILE`: store file name (default `providers.csv`)
    /// - `NPR_FETCH_TIMEOUT_SECS`: per-source ceiling (default 30)
    /// - `NPR_SYNTHETIC_COUNT`, `NPR_SYNTHETIC_LATENCY_MS`: synthetic sources
    /// - `NPR_ARCHIVE_URL`, `NPR_ARCHIVE_SAMPLE_SIZE`: enables the archive source
    /// - `NPR_DATABASE_URL`: SQLite store instead of CSV
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let store = StoreConfig {
            data_dir: std::env::var("NPR_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store.data_dir),
            file_name: std::env::var("NPR_STORE_FILE").unwrap_or(defaults.store.file_name),
        };

        let archive = match std::env::var("NPR_ARCHIVE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(ArchiveConfig {
                url: url.trim().to_string(),
                sample_size: env_or("NPR_ARCHIVE_SAMPLE_SIZE", 100)?,
            }),
            _ => None,
        };

        let config = Self {
            store,
            fetch_timeout_secs: env_or("NPR_FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs)?,
            synthetic: SyntheticConfig {
                count: env_or("NPR_SYNTHETIC_COUNT", defaults.synthetic.count)?,
                latency_ms: env_or("NPR_SYNTHETIC_LATENCY_MS", defaults.synthetic.latency_ms)?,
            },
            archive,
            database_url: std::env::var("NPR_DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every run fail
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(NprError::config("NPR_FETCH_TIMEOUT_SECS must be greater than zero"));
        }
        if self.store.file_name.trim().is_empty() {
            return Err(NprError::config("NPR_STORE_FILE must not be empty"));
        }
        if matches!(&self.archive, Some(archive) if archive.sample_size == 0) {
            return Err(NprError::config("NPR_ARCHIVE_SAMPLE_SIZE must be greater than zero"));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// The configured sources, in a stable order
    pub fn build_sources(&self) -> Result<Vec<NamedSource>> {
        let latency = Duration::from_millis(self.synthetic.latency_ms);

        let mut sources = vec![
            NamedSource::new(
                "registry_east",
                Arc::new(
                    SyntheticSource::new("registry_east", 100_000_000, self.synthetic.count)
                        .with_latency(latency),
                ),
            ),
            NamedSource::new(
                "registry_west",
                Arc::new(
                    SyntheticSource::new("registry_west", 200_000_000, self.synthetic.count)
                        .with_latency(latency),
                ),
            ),
        ];

        if let Some(archive) = &self.archive {
            let fetcher = fetcher_for(&archive.url).map_err(|e| {
                NprError::Config(format!("NPR_ARCHIVE_URL {}: {:#}", archive.url, e))
            })?;
            sources.push(NamedSource::new(
                "nppes_archive",
                Arc::new(ArchiveSource::new("nppes_archive", fetcher, archive.sample_size)),
            ));
        }

        Ok(sources)
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| NprError::config(format!("{} has invalid value '{}': {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}
