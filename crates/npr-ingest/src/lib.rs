//! NPR Ingest Library
//!
//! Collects healthcare provider records from independent sources into a
//! deduplicated store keyed by NPI.
//!
//! # Overview
//!
//! - **Store** ([`store`]): CSV file store (and SQLite behind the `database` feature)
//! - **Sources** ([`sources`]): synthetic registries and NPPES-style bulk archives
//! - **Orchestrator** ([`orchestrator`]): concurrent fetch with per-source timeouts
//! - **CLI** ([`cli`], [`commands`]): the `npr` binary
//!
//! # Example
//!
//! ```no_run
//! use npr_ingest::config::IngestConfig;
//! use npr_ingest::orchestrator::IngestOrchestrator;
//! use npr_ingest::store::CsvProviderStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let store = Arc::new(CsvProviderStore::new(&config.store));
//!     let orchestrator =
//!         IngestOrchestrator::new(store, config.build_sources()?, config.fetch_timeout());
//!
//!     let stats = orchestrator.fetch_and_store().await?;
//!     println!("{}", stats.summary());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod orchestrator;
pub mod sources;
pub mod store;

pub use cli::{Cli, Commands};
pub use config::{IngestConfig, StoreConfig};
pub use orchestrator::IngestOrchestrator;
pub use sources::{NamedSource, ProviderSource};
pub use store::ProviderStore;
