//! `resolve` and `guard` commands.

// CLI commands are allowed to use println! for output
#![allow(clippy::print_stdout)]

use super::{CommandOutcome, OutputFormat, parse_date, to_json};
use crate::guard::{GuardVerdict, IdentifierGuard};
use crate::models::{Identifier, ResolutionResult, ResolutionStatus, Section};
use crate::services::ServiceContainer;
use crate::Result;
use serde_json::json;

/// Runs the cascade for one object and prints the result.
pub fn cmd_resolve(
    services: &ServiceContainer,
    name: &str,
    section: Section,
    date: Option<&str>,
    format: OutputFormat,
) -> Result<CommandOutcome> {
    let date = parse_date(date)?;
    let result = services.resolver().resolve_at(name, section, date);
    match format {
        OutputFormat::Json => println!("{}", to_json(&result)?),
        OutputFormat::Table => print_resolution(&result),
    }
    Ok(CommandOutcome::from_failures(!result.is_success()))
}

fn print_resolution(result: &ResolutionResult) {
    println!("{} ({})", result.display_name, result.section);
    match result.status {
        ResolutionStatus::Success => {
            if let (Some(id), Some(via)) = (&result.identifier, result.provenance) {
                println!("  identifier: {id} (via {via})");
            }
            if let Some(position) = result.position {
                println!(
                    "  position:   RA {:.4}°  Dec {:+.4}°",
                    position.ra_deg, position.dec_deg
                );
            }
        },
        ResolutionStatus::Failed => println!("  unresolved"),
    }
    if let Some(canonical) = &result.canonical_name {
        println!("  canonical:  {canonical}");
    }
    if !result.failures.is_empty() {
        println!("  discarded:");
        for failure in &result.failures {
            println!(
                "    [{}] {}: {}",
                failure.stage, failure.candidate, failure.reason
            );
        }
    }
}

/// Prints the guard verdict for an identifier.
pub fn cmd_guard(identifier: &str, format: OutputFormat) -> Result<CommandOutcome> {
    let identifier = Identifier::new(identifier);
    let verdict = IdentifierGuard::new().validate(&identifier);
    match format {
        OutputFormat::Json => {
            let value = match &verdict {
                GuardVerdict::Accepted => json!({"identifier": identifier, "accepted": true}),
                GuardVerdict::Rejected { reason } => {
                    json!({"identifier": identifier, "accepted": false, "reason": reason})
                },
            };
            println!("{}", to_json(&value)?);
        },
        OutputFormat::Table => match &verdict {
            GuardVerdict::Accepted => println!("{identifier}: accepted"),
            GuardVerdict::Rejected { reason } => println!("{identifier}: rejected ({reason})"),
        },
    }
    Ok(CommandOutcome::from_failures(!verdict.is_accepted()))
}
