//! NPR - provider registry ingest tool

use clap::Parser;
use npr_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use npr_ingest::{commands, Cli, IngestConfig};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("npr")
        .build();

    // Environment variables take precedence over the flags
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging, so a failed init is not fatal
    let guard = init_logging(&log_config).ok();

    let mut config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        },
    };
    if let Some(data_dir) = &cli.data_dir {
        config.store.data_dir = data_dir.clone();
    }

    let outcome = commands::run(&cli, config).await;
    if let Err(e) = &outcome {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
    }

    // Flush buffered file logs before exiting
    drop(guard);
    if outcome.is_err() {
        process::exit(1);
    }
}
