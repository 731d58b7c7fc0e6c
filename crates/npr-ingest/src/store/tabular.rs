//! Row codec for the CSV provider file
//!
//! The file is a header row followed by one provider per line. Two layouts
//! are understood:
//!
//! - the current 12 column layout, which is what we write, and
//! - the legacy 9 column layout (no source or timestamps), which is only read.
//!
//! Rows are coerced to the current width: short rows are padded with empty
//! fields, long rows are truncated. Neither is treated as an error.

use chrono::{DateTime, Utc};
use csv::StringRecord;
use npr_common::ProviderRecord;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use npr_common::Result;

/// Columns written by the current store format
pub const CURRENT_COLUMNS: [&str; 12] = [
    "npi",
    "name",
    "credential",
    "phone",
    "address",
    "city",
    "state",
    "postal_code",
    "specialty",
    "source",
    "created_at",
    "updated_at",
];

/// Columns of the older layout, a prefix of [`CURRENT_COLUMNS`]
pub const LEGACY_COLUMNS: [&str; 9] = [
    "npi",
    "name",
    "credential",
    "phone",
    "address",
    "city",
    "state",
    "postal_code",
    "specialty",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Which layout a store file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Current,
    Legacy,
}

impl Schema {
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Schema::Current => &CURRENT_COLUMNS,
            Schema::Legacy => &LEGACY_COLUMNS,
        }
    }

    /// Recognise a header row, ignoring case and surrounding whitespace
    pub fn from_header(row: &StringRecord) -> Option<Schema> {
        [Schema::Current, Schema::Legacy].into_iter().find(|schema| {
            let columns = schema.columns();
            row.len() == columns.len()
                && row
                    .iter()
                    .zip(columns)
                    .all(|(field, column)| field.trim().eq_ignore_ascii_case(column))
        })
    }

    /// Layout implied by the first row of a file.
    ///
    /// A known header decides it. Without one, a row exactly as wide as the
    /// legacy layout marks a headerless legacy file.
    pub fn from_first_row(row: &StringRecord) -> Schema {
        Schema::from_header(row).unwrap_or(if row.len() == LEGACY_COLUMNS.len() {
            Schema::Legacy
        } else {
            Schema::Current
        })
    }
}

/// Open `path` for reading with any leading UTF-8 byte order mark skipped
pub fn open_without_bom(path: &Path) -> Result<BufReader<File>> {
    let mut reader = BufReader::new(File::open(path)?);
    if reader.fill_buf()?.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }
    Ok(reader)
}

/// Quote-aware reader that yields every row, header included, without
/// enforcing a fixed width
pub fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source)
}

/// Writer that quotes only fields containing a comma, quote or line break
pub fn writer<W: std::io::Write>(sink: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(sink)
}

/// Serialize a record in current column order
pub fn record_to_row(record: &ProviderRecord) -> [String; 12] {
    [
        record.npi.clone(),
        record.name.clone(),
        record.credential.clone(),
        record.phone.clone(),
        record.address.clone(),
        record.city.clone(),
        record.state.clone(),
        record.postal_code.clone(),
        record.specialty.clone(),
        record.source.clone(),
        format_timestamp(record.created_at),
        format_timestamp(record.updated_at),
    ]
}

/// Build a record from a row of any width
pub fn row_to_record(row: &StringRecord) -> ProviderRecord {
    if row.len() > CURRENT_COLUMNS.len() {
        warn!(
            columns = row.len(),
            expected = CURRENT_COLUMNS.len(),
            npi = row.get(0).unwrap_or_default(),
            "Row has extra columns, truncating"
        );
    }

    let field = |index: usize| row.get(index).unwrap_or_default().to_string();

    ProviderRecord {
        npi: field(0),
        name: field(1),
        credential: field(2),
        phone: field(3),
        address: field(4),
        city: field(5),
        state: field(6),
        postal_code: field(7),
        specialty: field(8),
        source: field(9),
        created_at: parse_timestamp(row.get(10).unwrap_or_default()),
        updated_at: parse_timestamp(row.get(11).unwrap_or_default()),
    }
}

fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map(|ts| ts.to_rfc3339()).unwrap_or_default()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            debug!(value = raw, error = %e, "Unparseable timestamp, treating as empty");
            None
        },
    }
}
