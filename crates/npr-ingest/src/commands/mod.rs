//! CLI command implementations
//!
//! Each group of subcommands has its own module. All of them work against a
//! [`CommandContext`], which owns the resolved configuration and the opened
//! store.

use anyhow::{Context as _, Result};
use npr_common::ProviderRecord;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::config::IngestConfig;
use crate::store::{CsvProviderStore, ProviderStore};

pub mod identifiers;
pub mod ingest;
pub mod providers;
pub mod store;

/// Everything a command needs to run
pub struct CommandContext {
    pub config: IngestConfig,
    pub store: Arc<dyn ProviderStore>,
    pub json: bool,
}

impl CommandContext {
    pub async fn new(config: IngestConfig, json: bool) -> Result<Self> {
        let store = open_store(&config).await?;
        debug!(store = %store.describe(), "Opened provider store");
        Ok(Self {
            config,
            store,
            json,
        })
    }

    /// Print `value` as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Print providers as JSON or as a compact listing
    pub fn print_records(&self, records: &[ProviderRecord]) -> Result<()> {
        if self.json {
            return self.print_json(records);
        }

        for record in records {
            println!("{}", format_line(record));
        }
        Ok(())
    }
}

/// Open the configured store backend
pub async fn open_store(config: &IngestConfig) -> Result<Arc<dyn ProviderStore>> {
    #[cfg(feature = "database")]
    {
        if let Some(url) = &config.database_url {
            let store = crate::store::SqliteProviderStore::connect(url)
                .await
                .with_context(|| format!("Failed to open database {}", url))?;
            return Ok(Arc::new(store));
        }
    }

    if config.database_url.is_some() && cfg!(not(feature = "database")) {
        anyhow::bail!("NPR_DATABASE_URL is set but npr was built without the `database` feature");
    }

    let store = CsvProviderStore::new(&config.store);
    Ok(Arc::new(store))
}

/// Run the parsed command line
pub async fn run(cli: &Cli, config: IngestConfig) -> Result<()> {
    let Some(command) = &cli.command else {
        anyhow::bail!("A subcommand is required. For more information, try '--help'.");
    };

    // Pure identifier helpers do not touch the store
    match command {
        Commands::Validate { npi } => return identifiers::validate(npi, cli.json),
        Commands::Generate { base } => return identifiers::generate(base, cli.json),
        _ => {},
    }

    let ctx = CommandContext::new(config, cli.json)
        .await
        .context("Failed to open provider store")?;

    match command {
        Commands::Init => store::init(&ctx).await,
        Commands::Fetch => ingest::fetch(&ctx).await,
        Commands::Refresh => ingest::refresh(&ctx).await,
        Commands::List { limit } => providers::list(&ctx, *limit).await,
        Commands::Show { npi } => providers::show(&ctx, npi).await,
        Commands::Search { text } => providers::search(&ctx, text).await,
        Commands::Add { npi, name, fields } => providers::add(&ctx, npi, name, fields).await,
        Commands::Update { npi, name, fields } => {
            providers::update(&ctx, npi, name.as_deref(), fields).await
        },
        Commands::Delete { npi } => providers::delete(&ctx, npi).await,
        Commands::Clear { yes } => providers::clear(&ctx, *yes).await,
        Commands::Stats => store::stats(&ctx).await,
        Commands::Validate { .. } | Commands::Generate { .. } => Ok(()),
    }
}

fn format_line(record: &ProviderRecord) -> String {
    let location = match (record.city.is_empty(), record.state.is_empty()) {
        (false, false) => format!("{}, {}", record.city, record.state),
        (false, true) => record.city.clone(),
        (true, false) => record.state.clone(),
        (true, true) => String::new(),
    };

    let mut line = format!("{}  {}", record.npi, record.name);
    for part in [&record.credential, &record.specialty, &location] {
        if !part.is_empty() {
            line.push_str("  ");
            line.push_str(part);
        }
    }
    if !record.source.is_empty() {
        line.push_str(&format!("  [{}]", record.source));
    }
    line
}
