//! NPPES-style archive source
//!
//! Downloads a (possibly compressed) bulk export, stages it in a temporary
//! directory, extracts the provider CSV and keeps the first `sample_size`
//! rows that carry a valid NPI and a name. Columns are located by header
//! name, so column order in the export does not matter. The staging
//! directory is removed when the fetch finishes, fails or is cancelled.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use npr_common::npi::is_valid_npi;
use npr_common::ProviderRecord;
use reqwest::Client;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::decompression::extract_csv;
use super::ProviderSource;

/// Delivers the raw archive bytes to a local file
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Where the archive comes from, for logs and errors
    fn describe(&self) -> String;

    /// Write the archive to `dest`, returning the number of bytes written
    async fn download(&self, dest: &Path) -> Result<u64>;
}

/// Pick a fetcher for `location`: `file://` URLs and bare paths are read
/// locally, everything else goes over HTTP.
pub fn fetcher_for(location: &str) -> Result<Box<dyn ArchiveFetcher>> {
    if let Some(path) = location.strip_prefix("file://") {
        Ok(Box::new(FileArchiveFetcher::new(path)))
    } else if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpArchiveFetcher::new(location)?))
    } else {
        Ok(Box::new(FileArchiveFetcher::new(location)))
    }
}

/// Streams an archive over HTTP(S)
pub struct HttpArchiveFetcher {
    client: Client,
    url: String,
}

impl HttpArchiveFetcher {
    /// Fails if the HTTP client cannot be built (for example TLS setup)
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .user_agent(concat!("npr-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn download(&self, dest: &Path) -> Result<u64> {
        info!(url = %self.url, "Downloading provider archive");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("Server rejected request for {}", self.url))?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("Archive download interrupted")?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

/// Copies an archive that is already on local disk
pub struct FileArchiveFetcher {
    path: PathBuf,
}

impl FileArchiveFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArchiveFetcher for FileArchiveFetcher {
    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn download(&self, dest: &Path) -> Result<u64> {
        tokio::fs::copy(&self.path, dest)
            .await
            .with_context(|| format!("Failed to read archive {}", self.path.display()))
    }
}

/// Source backed by a bulk provider export
pub struct ArchiveSource {
    tag: String,
    fetcher: Box<dyn ArchiveFetcher>,
    sample_size: usize,
    staging_root: Option<PathBuf>,
}

impl ArchiveSource {
    pub fn new(tag: impl Into<String>, fetcher: Box<dyn ArchiveFetcher>, sample_size: usize) -> Self {
        Self {
            tag: tag.into(),
            fetcher,
            sample_size,
            staging_root: None,
        }
    }

    /// Stage downloads under `root` instead of the system temp directory
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    fn staging_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("npr-archive-");
        let dir = match &self.staging_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            },
            None => builder.tempdir(),
        };
        dir.context("Failed to create staging directory")
    }
}

#[async_trait]
impl ProviderSource for ArchiveSource {
    async fn fetch(&self) -> Result<Vec<ProviderRecord>> {
        let staging = self.staging_dir()?;
        let download = staging.path().join("download");

        let bytes = self
            .fetcher
            .download(&download)
            .await
            .with_context(|| format!("Failed to fetch archive from {}", self.fetcher.describe()))?;
        debug!(source = %self.tag, bytes, "Archive staged");

        let staging_path = staging.path().to_path_buf();
        let tag = self.tag.clone();
        let sample_size = self.sample_size;

        let sample = tokio::task::spawn_blocking(move || -> Result<ArchiveSample> {
            let csv = extract_csv(&download, &staging_path)?;
            sample_providers(BufReader::new(File::open(&csv)?), &tag, sample_size)
        })
        .await
        .context("Archive parsing task failed")??;

        staging
            .close()
            .context("Failed to remove staging directory")?;

        info!(
            source = %self.tag,
            kept = sample.records.len(),
            scanned = sample.scanned,
            rejected = sample.rejected,
            "Sampled providers from archive"
        );

        Ok(sample.records)
    }
}

/// Result of scanning an export
#[derive(Debug, Default)]
pub struct ArchiveSample {
    pub records: Vec<ProviderRecord>,
    /// Data rows read before the sample filled up
    pub scanned: usize,
    /// Rows dropped for an invalid NPI or a missing name
    pub rejected: usize,
}

/// Export column headers, matched case-insensitively
mod columns {
    pub const NPI: &str = "npi";
    pub const ORGANIZATION: &str = "provider organization name (legal business name)";
    pub const LAST_NAME: &str = "provider last name (legal name)";
    pub const FIRST_NAME: &str = "provider first name";
    pub const CREDENTIAL: &str = "provider credential text";
    pub const ADDRESS: &str = "provider first line business practice location address";
    pub const CITY: &str = "provider business practice location address city name";
    pub const STATE: &str = "provider business practice location address state name";
    pub const POSTAL_CODE: &str = "provider business practice location address postal code";
    pub const PHONE: &str = "provider business practice location address telephone number";
    pub const TAXONOMY: &str = "healthcare provider taxonomy code_1";
}

/// Read up to `limit` valid providers from an NPPES-style CSV
pub fn sample_providers<R: Read>(source: R, tag: &str, limit: usize) -> Result<ArchiveSample> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(source);

    let index: HashMap<String, usize> = reader
        .headers()
        .context("Archive CSV has no header row")?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().trim_start_matches('\u{feff}').to_lowercase(), i))
        .collect();

    let Some(&npi_column) = index.get(columns::NPI) else {
        bail!("Archive CSV has no NPI column");
    };

    let mut sample = ArchiveSample::default();
    let mut row = csv::StringRecord::new();

    while sample.records.len() < limit && reader.read_record(&mut row)? {
        sample.scanned += 1;

        let field = |column: &str| {
            index
                .get(column)
                .and_then(|&i| row.get(i))
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };

        let npi = row.get(npi_column).map(str::trim).unwrap_or_default();
        if !is_valid_npi(npi) {
            sample.rejected += 1;
            continue;
        }

        let organization = field(columns::ORGANIZATION);
        let name = if organization.is_empty() {
            format!("{} {}", field(columns::FIRST_NAME), field(columns::LAST_NAME))
                .trim()
                .to_string()
        } else {
            organization
        };
        if name.is_empty() {
            sample.rejected += 1;
            continue;
        }

        sample.records.push(
            ProviderRecord::new(npi, name)
                .with_credential(field(columns::CREDENTIAL))
                .with_phone(field(columns::PHONE))
                .with_location(
                    field(columns::ADDRESS),
                    field(columns::CITY),
                    field(columns::STATE),
                    field(columns::POSTAL_CODE),
                )
                .with_specialty(field(columns::TAXONOMY))
                .with_source(tag),
        );
    }

    Ok(sample)
}
