//! Integration tests for the NPPES archive source over HTTP
//!
//! Archives are built in-test (zip and tar.gz) and served from a mock server.

use flate2::{write::GzEncoder, Compression};
use npr_common::npi::is_valid_npi;
use npr_ingest::sources::{ArchiveSource, HttpArchiveFetcher, ProviderSource};
use std::io::{Cursor, Write};
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const HEADER: &str = "\"NPI\",\"Entity Type Code\",\"Provider Organization Name (Legal Business Name)\",\"Provider Last Name (Legal Name)\",\"Provider First Name\",\"Provider Credential Text\",\"Provider First Line Business Practice Location Address\",\"Provider Business Practice Location Address City Name\",\"Provider Business Practice Location Address State Name\",\"Provider Business Practice Location Address Postal Code\",\"Provider Business Practice Location Address Telephone Number\",\"Healthcare Provider Taxonomy Code_1\"";

/// Export with `valid` good rows interleaved with rows that fail the check digit
fn export(valid: u32) -> String {
    let mut text = String::from(HEADER);
    for base in 0..valid {
        let npi = npr_common::npi::generate_npi(&format!("{:09}", 300_000_000 + base))
            .expect("valid base");
        text.push_str(&format!(
            "\n\"{}\",\"1\",\"\",\"LAST{}\",\"FIRST\",\"MD\",\"1 MAIN ST\",\"AUSTIN\",\"TX\",\"787010000\",\"5125550100\",\"207Q00000X\"",
            npi, base
        ));
        text.push_str("\n\"1234567890\",\"1\",\"\",\"BROKEN\",\"ROW\",\"\",\"\",\"\",\"\",\"\",\"\",\"\"");
    }
    text.push('\n');
    text
}

fn zip_archive(csv: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    writer
        .start_file("npidata_pfile_20240101-20240107_fileheader.csv", options)
        .unwrap();
    writer.write_all(HEADER.as_bytes()).unwrap();
    writer
        .start_file("npidata_pfile_20240101-20240107.csv", options)
        .unwrap();
    writer.write_all(csv.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn tar_gz_archive(csv: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(csv.len() as u64);
    header.set_mode(0o644);
    builder
        .append_data(&mut header, "export/providers.csv", csv.as_bytes())
        .unwrap();
    let tar = builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

fn fetcher(server: &MockServer, route: &str) -> HttpArchiveFetcher {
    HttpArchiveFetcher::new(format!("{}{}", server.uri(), route)).unwrap()
}

async fn serve(bytes: Vec<u8>, route: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_zip_archive_is_sampled() {
    let server = serve(zip_archive(&export(8)), "/nppes.zip").await;
    let staging = TempDir::new().unwrap();

    let source = ArchiveSource::new(
        "nppes",
        Box::new(fetcher(&server, "/nppes.zip")),
        5,
    )
    .with_staging_root(staging.path());

    let records = source.fetch().await.unwrap();

    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| is_valid_npi(&r.npi)));
    assert_eq!(records[0].name, "FIRST LAST0");
    assert_eq!(records[0].city, "AUSTIN");
    assert_eq!(records[0].phone, "5125550100");
    assert!(records.iter().all(|r| r.source == "nppes"));
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_tar_gz_archive_is_sampled() {
    let server = serve(tar_gz_archive(&export(3)), "/nppes.tar.gz").await;

    let source = ArchiveSource::new(
        "nppes",
        Box::new(fetcher(&server, "/nppes.tar.gz")),
        100,
    );

    let records = source.fetch().await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].name, "FIRST LAST2");
}

#[tokio::test]
async fn test_http_error_is_a_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let staging = TempDir::new().unwrap();

    let source = ArchiveSource::new(
        "nppes",
        Box::new(fetcher(&server, "/missing.zip")),
        10,
    )
    .with_staging_root(staging.path());

    let err = source.fetch().await.unwrap_err();
    assert!(format!("{:#}", err).contains("404"));
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_archive_without_data_file_fails() {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("README.txt", zip::write::FileOptions::default())
        .unwrap();
    writer.write_all(b"no data here").unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let server = serve(bytes, "/empty.zip").await;
    let source = ArchiveSource::new(
        "nppes",
        Box::new(fetcher(&server, "/empty.zip")),
        10,
    );

    let err = source.fetch().await.unwrap_err();
    assert!(format!("{:#}", err).contains("No provider CSV"));
}
