//! Synthetic provider source
//!
//! Stands in for a remote registry: waits for a configurable latency and then
//! returns a deterministic batch of providers with valid NPIs. Two synthetic
//! sources with disjoint base ranges never produce the same NPI.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use npr_common::npi::generate_npi;
use npr_common::ProviderRecord;
use std::time::Duration;
use tracing::debug;

use super::ProviderSource;

const FIRST_NAMES: [&str; 8] = [
    "Avery", "Jordan", "Morgan", "Riley", "Casey", "Quinn", "Harper", "Rowan",
];

const LAST_NAMES: [&str; 10] = [
    "Okafor", "Lindqvist", "Haddad", "Moreau", "Tanaka", "Alvarez", "Novak", "Brennan", "Osei",
    "Castellano",
];

const CREDENTIALS: [&str; 5] = ["MD", "DO", "NP", "PA-C", "DDS"];

const SPECIALTIES: [&str; 7] = [
    "Family Medicine",
    "Internal Medicine",
    "Pediatrics",
    "Cardiology",
    "Dermatology",
    "Orthopaedic Surgery",
    "Psychiatry",
];

const CITIES: [(&str, &str, &str); 6] = [
    ("Springfield", "IL", "62701"),
    ("Madison", "WI", "53703"),
    ("Portland", "OR", "97205"),
    ("Austin", "TX", "78701"),
    ("Raleigh", "NC", "27601"),
    ("Boise", "ID", "83702"),
];

const STREETS: [&str; 4] = ["Main St", "Oak Ave", "Elm St", "Lakeview Dr"];

/// Deterministic in-memory source
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    tag: String,
    start_base: u32,
    count: usize,
    latency: Duration,
    failure: Option<String>,
}

impl SyntheticSource {
    /// `count` providers whose NPI bases start at `start_base`
    pub fn new(tag: impl Into<String>, start_base: u32, count: usize) -> Self {
        Self {
            tag: tag.into(),
            start_base,
            count,
            latency: Duration::ZERO,
            failure: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every fetch fail with `reason` after the latency has elapsed
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    fn provider(&self, index: usize) -> Result<ProviderRecord> {
        let base = u32::try_from(index)
            .ok()
            .and_then(|offset| self.start_base.checked_add(offset))
            .filter(|base| *base <= 999_999_999)
            .with_context(|| {
                format!("NPI base range exhausted at {} + {}", self.start_base, index)
            })?;

        let npi = generate_npi(&format!("{:09}", base))
            .with_context(|| format!("Cannot derive NPI from base {}", base))?;

        let first = FIRST_NAMES[index % FIRST_NAMES.len()];
        let last = LAST_NAMES[(index / FIRST_NAMES.len()) % LAST_NAMES.len()];
        let (city, state, postal_code) = CITIES[index % CITIES.len()];

        Ok(ProviderRecord::new(npi, format!("{} {}", first, last))
            .with_credential(CREDENTIALS[index % CREDENTIALS.len()])
            .with_phone(format!("555-{:04}", base % 10_000))
            .with_location(
                format!("{} {}", 100 + index, STREETS[index % STREETS.len()]),
                city,
                state,
                postal_code,
            )
            .with_specialty(SPECIALTIES[index % SPECIALTIES.len()])
            .with_source(&self.tag))
    }
}

#[async_trait]
impl ProviderSource for SyntheticSource {
    async fn fetch(&self) -> Result<Vec<ProviderRecord>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(reason) = &self.failure {
            bail!("{}", reason);
        }

        let records = (0..self.count)
            .map(|index| self.provider(index))
            .collect::<Result<Vec<_>>>()?;

        debug!(source = %self.tag, count = records.len(), "Generated synthetic providers");
        Ok(records)
    }
}
