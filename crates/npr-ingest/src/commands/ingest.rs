//! `npr fetch` and `npr refresh`

use anyhow::Result;
use colored::Colorize;
use npr_common::OperationStats;

use super::CommandContext;
use crate::orchestrator::IngestOrchestrator;

fn orchestrator(ctx: &CommandContext) -> Result<IngestOrchestrator> {
    Ok(IngestOrchestrator::new(
        ctx.store.clone(),
        ctx.config.build_sources()?,
        ctx.config.fetch_timeout(),
    ))
}

/// Fetch all sources into the existing store
pub async fn fetch(ctx: &CommandContext) -> Result<()> {
    let stats = orchestrator(ctx)?.fetch_and_store().await?;
    report(ctx, &stats)
}

/// Clear the store and fetch everything again
pub async fn refresh(ctx: &CommandContext) -> Result<()> {
    let stats = orchestrator(ctx)?.refresh().await?;
    report(ctx, &stats)
}

fn report(ctx: &CommandContext, stats: &OperationStats) -> Result<()> {
    if ctx.json {
        return ctx.print_json(stats);
    }

    println!("{}", stats.summary());

    let failed = stats.failed_sources();
    if failed.is_empty() {
        println!("{}", "All sources completed".green());
    } else {
        println!(
            "{} {}",
            "Sources with problems:".yellow().bold(),
            failed.join(", ")
        );
    }
    Ok(())
}
