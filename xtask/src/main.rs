//! Build automation tasks for NPR
//!
//! Currently generates the `npr` CLI reference from the clap definitions.

use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for NPR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for the generated file
        #[arg(short, long, default_value = "docs")]
        output_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &Path) -> anyhow::Result<()> {
    let commands = clap_markdown::help_markdown::<npr_ingest::Cli>();

    let content = format!(
        r#"# npr CLI Reference

Generated from the CLI source on {date}. Run `cargo xtask generate-cli-docs` to update.

## Quick Start

```bash
# Create an empty store under ./data
npr init

# Pull every configured source into the store
npr fetch

# Start over from an empty store
npr refresh

# Look around
npr list --limit 20
npr search clinic
npr stats --json
```

## Environment Variables

| Variable | Default | Meaning |
|----------|---------|---------|
| `NPR_DATA_DIR` | `./data` | Directory holding the store |
| `NPR_STORE_FILE` | `providers.csv` | Store file name |
| `NPR_FETCH_TIMEOUT_SECS` | `30` | Per-source fetch ceiling |
| `NPR_SYNTHETIC_COUNT` | `25` | Records per synthetic source |
| `NPR_SYNTHETIC_LATENCY_MS` | `250` | Simulated synthetic latency |
| `NPR_ARCHIVE_URL` | unset | NPPES export to sample (http(s), file:// or path) |
| `NPR_ARCHIVE_SAMPLE_SIZE` | `100` | Valid rows kept from the export |
| `NPR_DATABASE_URL` | unset | SQLite store (`database` feature) |
| `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` | | Logging |

## Commands

{commands}
"#,
        date = chrono::Utc::now().format("%Y-%m-%d"),
        commands = commands
    );

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let file_path = output_dir.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());
    Ok(())
}
