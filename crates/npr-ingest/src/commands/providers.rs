//! Record-level commands: list, show, search, add, update, delete, clear

use anyhow::{bail, Result};
use chrono::Utc;
use colored::Colorize;
use futures::{StreamExt, TryStreamExt};
use npr_common::{InsertOutcome, NprError, ProviderRecord};

use super::CommandContext;
use crate::cli::ProviderFields;

/// Source tag given to records entered by hand
pub const MANUAL_SOURCE: &str = "manual";

pub async fn list(ctx: &CommandContext, limit: Option<usize>) -> Result<()> {
    let stream = ctx.store.list_all();
    let records: Vec<ProviderRecord> = match limit {
        Some(limit) => stream.take(limit).try_collect().await?,
        None => stream.try_collect().await?,
    };

    if records.is_empty() && !ctx.json {
        println!("No providers stored. Run 'npr fetch' to ingest some.");
        return Ok(());
    }
    ctx.print_records(&records)
}

pub async fn show(ctx: &CommandContext, npi: &str) -> Result<()> {
    let Some(record) = ctx.store.find(npi).await? else {
        bail!("No provider with NPI {}", npi);
    };

    if ctx.json {
        return ctx.print_json(&record);
    }

    println!("{}", record.name.green().bold());
    println!("  NPI:        {}", record.npi);
    println!("  Credential: {}", record.credential);
    println!("  Specialty:  {}", record.specialty);
    println!("  Phone:      {}", record.phone);
    println!(
        "  Address:    {}, {}, {} {}",
        record.address, record.city, record.state, record.postal_code
    );
    println!("  Source:     {}", record.source);
    if let Some(created) = record.created_at {
        println!("  Created:    {}", created.to_rfc3339());
    }
    if let Some(updated) = record.updated_at {
        println!("  Updated:    {}", updated.to_rfc3339());
    }
    Ok(())
}

pub async fn search(ctx: &CommandContext, text: &str) -> Result<()> {
    let matches = ctx.store.search(text).await?;
    if matches.is_empty() && !ctx.json {
        println!("No providers match '{}'", text);
        return Ok(());
    }
    ctx.print_records(&matches)
}

pub async fn add(
    ctx: &CommandContext,
    npi: &str,
    name: &str,
    fields: &ProviderFields,
) -> Result<()> {
    let record = apply_fields(ProviderRecord::new(npi, name), fields)
        .with_source(MANUAL_SOURCE)
        .with_timestamps(Utc::now());

    match ctx.store.insert_if_missing(&record).await? {
        InsertOutcome::Inserted => {
            println!("{} {}", "Added".green(), record.npi);
            Ok(())
        },
        InsertOutcome::AlreadyExists => Err(NprError::DuplicateKey(record.npi).into()),
    }
}

pub async fn update(
    ctx: &CommandContext,
    npi: &str,
    name: Option<&str>,
    fields: &ProviderFields,
) -> Result<()> {
    let Some(existing) = ctx.store.find(npi).await? else {
        bail!("No provider with NPI {}", npi);
    };

    let mut record = apply_fields(existing, fields);
    if let Some(name) = name {
        record.name = name.to_string();
    }
    record.updated_at = None;

    if !ctx.store.update(npi, &record).await? {
        bail!("No provider with NPI {}", npi);
    }
    println!("{} {}", "Updated".green(), npi);
    Ok(())
}

pub async fn delete(ctx: &CommandContext, npi: &str) -> Result<()> {
    if !ctx.store.delete(npi).await? {
        bail!("No provider with NPI {}", npi);
    }
    println!("{} {}", "Deleted".green(), npi);
    Ok(())
}

pub async fn clear(ctx: &CommandContext, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to remove every provider without --yes");
    }
    ctx.store.clear().await?;
    println!("{} {}", "Cleared".green(), ctx.store.describe());
    Ok(())
}

/// Overlay the fields that were given on the command line
pub fn apply_fields(mut record: ProviderRecord, fields: &ProviderFields) -> ProviderRecord {
    let overlays = [
        (&mut record.credential, &fields.credential),
        (&mut record.phone, &fields.phone),
        (&mut record.address, &fields.address),
        (&mut record.city, &fields.city),
        (&mut record.state, &fields.state),
        (&mut record.postal_code, &fields.postal_code),
        (&mut record.specialty, &fields.specialty),
    ];

    for (target, value) in overlays {
        if let Some(value) = value {
            *target = value.trim().to_string();
        }
    }
    record
}
