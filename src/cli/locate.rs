//! `locate` and `lookup` commands.

// CLI commands are allowed to use println! for output
#![allow(clippy::print_stdout)]

use super::{CommandOutcome, OutputFormat, parse_date, to_json};
use crate::models::Section;
use crate::services::ServiceContainer;
use crate::storage::LookupOutcome;
use crate::Result;
use serde_json::json;

/// Cache-first position lookup with live fallback.
pub fn cmd_locate(
    services: &ServiceContainer,
    name: &str,
    section: Section,
    date: Option<&str>,
    format: OutputFormat,
) -> Result<CommandOutcome> {
    let date = parse_date(date)?;
    let located = services.positions().locate(name, section, date)?;
    match format {
        OutputFormat::Json => println!("{}", to_json(&located)?),
        OutputFormat::Table => {
            println!("{} on {date} [{}]", located.key, located.source);
            println!(
                "  RA {:.4}°  Dec {:+.4}°",
                located.position.ra_deg, located.position.dec_deg
            );
            if let Some(mag) = located.magnitude {
                println!("  mag {mag:.1}");
            }
            if let (Some(id), Some(via)) = (&located.identifier, located.provenance) {
                println!("  identifier {id} (via {via})");
            }
            if let Some(miss) = &located.cache_miss {
                println!("  cache miss: {miss}");
            }
        },
    }
    Ok(CommandOutcome::Clean)
}

/// Ephemeris-cache-only lookup. A miss is reported, not an error.
pub fn cmd_lookup(
    services: &ServiceContainer,
    name: &str,
    section: Section,
    date: Option<&str>,
    format: OutputFormat,
) -> Result<CommandOutcome> {
    let date = parse_date(date)?;
    let outcome = services.positions().cached(name, section, date);
    match (format, &outcome) {
        (OutputFormat::Json, LookupOutcome::Hit(sample)) => {
            println!("{}", to_json(&json!({"hit": true, "sample": sample}))?);
        },
        (OutputFormat::Json, LookupOutcome::Miss(reason)) => {
            println!("{}", to_json(&json!({"hit": false, "reason": reason.as_str()}))?);
        },
        (OutputFormat::Table, LookupOutcome::Hit(sample)) => {
            println!(
                "{name} on {date}: RA {:.4}°  Dec {:+.4}°",
                sample.ra_deg, sample.dec_deg
            );
        },
        (OutputFormat::Table, LookupOutcome::Miss(reason)) => {
            println!("{name} on {date}: miss ({reason})");
        },
    }
    Ok(CommandOutcome::from_failures(outcome.sample().is_none()))
}
