//! CSV-backed provider store
//!
//! Inserts append a single line. Every other mutation (update, delete, clear,
//! overwrite) reads the full snapshot, changes it in memory and rewrites the
//! whole file through a sibling temp file that is renamed over the original,
//! so readers never observe a half-written file.
//!
//! Mutations are serialized by an in-process lock. Two processes writing the
//! same file at once is not supported.

use async_trait::async_trait;
use chrono::Utc;
use csv::StringRecordsIntoIter;
use futures::stream::{self, BoxStream, StreamExt};
use npr_common::{InsertOutcome, NprError, ProviderRecord, Result, StoreStats};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::tabular::{self, Schema, CURRENT_COLUMNS};
use super::ProviderStore;
use crate::config::StoreConfig;

/// Provider store persisted as a single CSV file
pub struct CsvProviderStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvProviderStore {
    /// Store at the location resolved in `config`
    pub fn new(config: &StoreConfig) -> Self {
        Self::at_path(config.store_path())
    }

    /// Store backed by an explicit file path
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with just a header if it does not exist yet.
    ///
    /// Returns `true` when the file was created by this call.
    pub fn initialize(&self) -> Result<bool> {
        let _guard = self.lock();
        self.initialize_locked()
    }

    /// Lazily iterate over every stored record in file order.
    ///
    /// Each call opens the file again, so the sequence can be restarted by
    /// calling `records` a second time. A missing file yields no records.
    pub fn records(&self) -> Result<ProviderRecords> {
        if !self.path.exists() {
            return Ok(ProviderRecords::empty());
        }

        let source = tabular::open_without_bom(&self.path)?;
        Ok(ProviderRecords {
            rows: Some(tabular::reader(source).into_records()),
            at_first_row: true,
        })
    }

    /// Read the full snapshot into memory
    pub fn load_all(&self) -> Result<Vec<ProviderRecord>> {
        self.records()?.collect()
    }

    pub fn find(&self, npi: &str) -> Result<Option<ProviderRecord>> {
        for record in self.records()? {
            let record = record?;
            if record.npi == npi {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Case-insensitive substring search on the provider name
    pub fn search(&self, text: &str) -> Result<Vec<ProviderRecord>> {
        let mut matches = Vec::new();
        for record in self.records()? {
            let record = record?;
            if record.name_contains(text) {
                matches.push(record);
            }
        }
        Ok(matches)
    }

    /// Append `record` unless its NPI is already stored
    pub fn insert_if_missing(&self, record: &ProviderRecord) -> Result<InsertOutcome> {
        record.validate()?;

        let _guard = self.lock();
        self.initialize_locked()?;
        self.ensure_writable()?;

        if self.contains_locked(&record.npi)? {
            debug!(npi = %record.npi, "Provider already stored");
            return Ok(InsertOutcome::AlreadyExists);
        }

        let needs_newline = !self.ends_with_newline()?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        if needs_newline {
            file.write_all(b"\n")?;
        }

        let mut writer = tabular::writer(&mut file);
        writer.write_record(tabular::record_to_row(record))?;
        writer.flush()?;

        Ok(InsertOutcome::Inserted)
    }

    /// Replace the whole file with `records`
    pub fn overwrite_all(&self, records: &[ProviderRecord]) -> Result<()> {
        let _guard = self.lock();
        self.ensure_writable()?;
        self.write_snapshot(records)
    }

    /// Replace the record stored under `npi`.
    ///
    /// Returns `false` if no record has that NPI. The replacement may carry a
    /// different NPI as long as no other record already uses it.
    pub fn update(&self, npi: &str, record: &ProviderRecord) -> Result<bool> {
        record.validate()?;

        let _guard = self.lock();
        self.ensure_writable()?;

        let mut snapshot = self.load_all()?;
        let Some(index) = snapshot.iter().position(|r| r.npi == npi) else {
            return Ok(false);
        };

        if record.npi != npi && snapshot.iter().any(|r| r.npi == record.npi) {
            return Err(NprError::DuplicateKey(record.npi.clone()));
        }

        let mut replacement = record.clone();
        replacement.created_at = replacement.created_at.or(snapshot[index].created_at);
        replacement.updated_at = Some(Utc::now());
        snapshot[index] = replacement;

        self.write_snapshot(&snapshot)?;
        Ok(true)
    }

    /// Remove the record stored under `npi`, returning whether one existed
    pub fn delete(&self, npi: &str) -> Result<bool> {
        let _guard = self.lock();
        self.ensure_writable()?;

        let mut snapshot = self.load_all()?;
        let before = snapshot.len();
        snapshot.retain(|r| r.npi != npi);
        if snapshot.len() == before {
            return Ok(false);
        }

        self.write_snapshot(&snapshot)?;
        Ok(true)
    }

    /// Truncate to the header row
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock();
        self.ensure_writable()?;
        self.write_snapshot(&[])?;
        info!(path = %self.path.display(), "Provider store cleared");
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for record in self.records()? {
            let record = record?;
            stats.total += 1;
            *stats.by_source.entry(record.source).or_insert(0) += 1;
        }
        Ok(stats)
    }

    /// Layout of the file on disk.
    ///
    /// A missing or empty file counts as current. A headerless file whose
    /// first row is nine columns wide counts as legacy.
    pub fn schema(&self) -> Result<Schema> {
        if !self.path.exists() {
            return Ok(Schema::Current);
        }

        let source = tabular::open_without_bom(&self.path)?;
        let mut rows = tabular::reader(source).into_records();
        match rows.next() {
            Some(row) => Ok(Schema::from_first_row(&row?)),
            None => Ok(Schema::Current),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize_locked(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        self.write_snapshot(&[])?;
        info!(path = %self.path.display(), "Created provider store");
        Ok(true)
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.schema()? {
            Schema::Current => Ok(()),
            Schema::Legacy => Err(NprError::ReadOnlyLegacy(self.path.clone())),
        }
    }

    fn contains_locked(&self, npi: &str) -> Result<bool> {
        Ok(self.find(npi)?.is_some())
    }

    fn ends_with_newline(&self) -> Result<bool> {
        let mut file = File::open(&self.path)?;
        if file.metadata()?.len() == 0 {
            return Ok(true);
        }

        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }

    fn write_snapshot(&self, records: &[ProviderRecord]) -> Result<()> {
        let mut seen = HashSet::with_capacity(records.len());
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.npi.as_str())) {
            return Err(NprError::DuplicateKey(dup.npi.clone()));
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let staged = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = tabular::writer(staged.as_file());
            writer.write_record(CURRENT_COLUMNS)?;
            for record in records {
                writer.write_record(tabular::record_to_row(record))?;
            }
            writer.flush()?;
        }
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .map_err(|e| NprError::Storage(e.error))?;

        debug!(path = %self.path.display(), records = records.len(), "Rewrote provider store");
        Ok(())
    }
}

/// Lazy iterator over the records of a CSV store file
pub struct ProviderRecords {
    rows: Option<StringRecordsIntoIter<BufReader<File>>>,
    at_first_row: bool,
}

impl ProviderRecords {
    fn empty() -> Self {
        Self {
            rows: None,
            at_first_row: false,
        }
    }
}

impl Iterator for ProviderRecords {
    type Item = Result<ProviderRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.rows.as_mut()?;
        loop {
            let row = match rows.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e.into())),
            };

            if std::mem::take(&mut self.at_first_row) && Schema::from_header(&row).is_some() {
                continue;
            }

            return Some(Ok(tabular::row_to_record(&row)));
        }
    }
}

#[async_trait]
impl ProviderStore for CsvProviderStore {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    async fn initialize(&self) -> Result<()> {
        CsvProviderStore::initialize(self).map(|_| ())
    }

    fn list_all(&self) -> BoxStream<'_, Result<ProviderRecord>> {
        match self.records() {
            Ok(records) => stream::iter(records).boxed(),
            Err(e) => stream::iter(std::iter::once(Err(e))).boxed(),
        }
    }

    async fn find(&self, npi: &str) -> Result<Option<ProviderRecord>> {
        CsvProviderStore::find(self, npi)
    }

    async fn search(&self, text: &str) -> Result<Vec<ProviderRecord>> {
        CsvProviderStore::search(self, text)
    }

    async fn insert_if_missing(&self, record: &ProviderRecord) -> Result<InsertOutcome> {
        CsvProviderStore::insert_if_missing(self, record)
    }

    async fn overwrite_all(&self, records: &[ProviderRecord]) -> Result<()> {
        CsvProviderStore::overwrite_all(self, records)
    }

    async fn update(&self, npi: &str, record: &ProviderRecord) -> Result<bool> {
        CsvProviderStore::update(self, npi, record)
    }

    async fn delete(&self, npi: &str) -> Result<bool> {
        CsvProviderStore::delete(self, npi)
    }

    async fn clear(&self) -> Result<()> {
        CsvProviderStore::clear(self)
    }

    async fn stats(&self) -> Result<StoreStats> {
        CsvProviderStore::stats(self)
    }
}
