//! Archive unpacking for downloaded provider files
//!
//! The format is sniffed from the leading bytes rather than trusted from a
//! URL or file extension:
//!
//! - **Zip**: `PK\x03\x04`
//! - **Gzip**: `\x1f\x8b`, possibly wrapping a tar
//! - **Tar**: `ustar` magic at offset 257
//! - anything else is taken to be the CSV itself
//!
//! Everything streams between files in a staging directory so the archive is
//! never held in memory twice.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const GZIP_MAGIC: &[u8] = b"\x1f\x8b";
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;

/// Name given to the extracted data file inside the staging directory
pub const EXTRACTED_CSV: &str = "providers.csv";

/// Container format of a downloaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Gzip,
    Tar,
    Plain,
}

impl ArchiveFormat {
    /// Identify the format from the first bytes of a file
    pub fn detect(header: &[u8]) -> Self {
        if header.starts_with(ZIP_MAGIC) {
            ArchiveFormat::Zip
        } else if header.starts_with(GZIP_MAGIC) {
            ArchiveFormat::Gzip
        } else if header
            .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len())
            .is_some_and(|magic| magic == TAR_MAGIC)
        {
            ArchiveFormat::Tar
        } else {
            ArchiveFormat::Plain
        }
    }

    /// Sniff the format of the file at `path`
    pub fn detect_file(path: &Path) -> Result<Self> {
        let mut header = Vec::with_capacity(512);
        File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .take(512)
            .read_to_end(&mut header)?;
        Ok(Self::detect(&header))
    }
}

/// Whether an archive member looks like the provider data file.
///
/// NPPES bundles ship a `*_fileheader.csv` next to the data; that one is skipped.
pub fn is_data_csv(member: &str) -> bool {
    let file_name = member.rsplit('/').next().unwrap_or(member).to_lowercase();
    file_name.ends_with(".csv") && !file_name.contains("fileheader")
}

/// Unpack `archive` into `staging_dir` and return the path of the provider CSV
pub fn extract_csv(archive: &Path, staging_dir: &Path) -> Result<PathBuf> {
    let dest = staging_dir.join(EXTRACTED_CSV);

    match ArchiveFormat::detect_file(archive)? {
        ArchiveFormat::Zip => extract_zip_csv(archive, &dest)?,
        ArchiveFormat::Tar => extract_tar_csv(File::open(archive)?, &dest)?,
        ArchiveFormat::Gzip => {
            let inflated = staging_dir.join("payload");
            decompress_gzip(archive, &inflated)?;
            match ArchiveFormat::detect_file(&inflated)? {
                ArchiveFormat::Tar => extract_tar_csv(File::open(&inflated)?, &dest)?,
                ArchiveFormat::Plain => std::fs::rename(&inflated, &dest)?,
                other => bail!("Unsupported archive nested in gzip: {:?}", other),
            }
        },
        ArchiveFormat::Plain => {
            std::fs::copy(archive, &dest)?;
        },
    }

    Ok(dest)
}

/// Inflate a gzip file
pub fn decompress_gzip(source: &Path, dest: &Path) -> Result<u64> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(source)?));
    let mut out = File::create(dest)?;
    let written = io::copy(&mut decoder, &mut out).context("Failed to decompress gzip data")?;
    debug!(bytes = written, "Decompressed gzip payload");
    Ok(written)
}

fn extract_tar_csv<R: Read>(source: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(source);

    for entry in archive.entries().context("Failed to read tar entries")? {
        let mut entry = entry.context("Failed to read tar entry")?;
        let member = entry
            .path()
            .context("Failed to get entry path")?
            .to_string_lossy()
            .to_string();

        if entry.header().entry_type().is_file() && is_data_csv(&member) {
            let written = io::copy(&mut entry, &mut File::create(dest)?)
                .with_context(|| format!("Failed to read tar entry: {}", member))?;
            debug!(member = %member, bytes = written, "Extracted provider file from tar");
            return Ok(());
        }
    }

    bail!("No provider CSV found in tar archive")
}

fn extract_zip_csv(source: &Path, dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(source)?))
        .context("Failed to read zip archive")?;

    let mut candidates: Vec<(usize, String)> = Vec::new();
    for index in 0..archive.len() {
        let file = archive
            .by_index(index)
            .with_context(|| format!("Failed to read zip entry at index {}", index))?;
        if !file.is_dir() && is_data_csv(file.name()) {
            candidates.push((index, file.name().to_string()));
        }
    }

    // Prefer the main NPPES data file when the bundle carries several CSVs
    let chosen = candidates
        .iter()
        .find(|(_, name)| name.to_lowercase().contains("npidata"))
        .or_else(|| candidates.first());

    let Some((index, member)) = chosen else {
        bail!("No provider CSV found in zip archive");
    };

    let mut file = archive.by_index(*index)?;
    let written = io::copy(&mut file, &mut File::create(dest)?)
        .with_context(|| format!("Failed to read zip entry: {}", member))?;
    debug!(member = %member, bytes = written, "Extracted provider file from zip");
    Ok(())
}
