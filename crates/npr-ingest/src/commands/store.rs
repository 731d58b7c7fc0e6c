//! `npr init` and `npr stats`

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::CommandContext;

pub async fn init(ctx: &CommandContext) -> Result<()> {
    ctx.store.initialize().await?;

    if ctx.json {
        return ctx.print_json(&json!({ "store": ctx.store.describe() }));
    }
    println!("{} {}", "Store ready:".green(), ctx.store.describe());
    Ok(())
}

pub async fn stats(ctx: &CommandContext) -> Result<()> {
    let stats = ctx.store.stats().await?;

    if ctx.json {
        return ctx.print_json(&stats);
    }

    println!("{}", "Provider Store:".cyan().bold());
    println!("  Location: {}", ctx.store.describe());
    println!("  Total:    {}", stats.total);
    for (source, count) in &stats.by_source {
        let label = if source.is_empty() { "(untagged)" } else { source.as_str() };
        println!("  {:<20} {}", label, count);
    }
    Ok(())
}
