//! `npr validate` and `npr generate`

use anyhow::{Context, Result};
use colored::Colorize;
use npr_common::npi::{generate_npi, validate_npi};
use serde_json::json;

/// Report whether `npi` is well formed. An invalid NPI is an error so the
/// exit status can be scripted against.
pub fn validate(npi: &str, json: bool) -> Result<()> {
    let outcome = validate_npi(npi);

    if json {
        let reason = outcome.as_ref().err().map(|e| e.to_string());
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "npi": npi,
                "valid": outcome.is_ok(),
                "reason": reason,
            }))?
        );
    } else if outcome.is_ok() {
        println!("{} {}", npi, "valid".green());
    }

    outcome.with_context(|| format!("{} is not a valid NPI", npi))
}

pub fn generate(base: &str, json: bool) -> Result<()> {
    let npi = generate_npi(base)
        .with_context(|| format!("'{}' is not a 9-digit base", base))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "base": base, "npi": npi }))?
        );
    } else {
        println!("{}", npi);
    }
    Ok(())
}
