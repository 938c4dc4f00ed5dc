//! `rebuild`, `populate` and `diagnose` commands.

// CLI commands are allowed to use println! for output
#![allow(clippy::print_stdout)]

use super::{CommandOutcome, OutputFormat, to_json};
use crate::batch;
use crate::services::ServiceContainer;
use crate::Result;
use std::path::Path;

/// Rebuilds the ephemeris cache for the whole watchlist.
pub fn cmd_rebuild(
    services: &ServiceContainer,
    window_days: Option<u32>,
    report_path: Option<&Path>,
    format: OutputFormat,
) -> Result<CommandOutcome> {
    let watchlist = services.watchlist()?;
    let mut rebuilder = services.rebuilder();
    if let Some(days) = window_days {
        let config = rebuilder.config().with_window_days(days);
        rebuilder = rebuilder.with_config(config);
    }

    let report = rebuilder.rebuild(&watchlist)?;
    if let Some(path) = report_path {
        report.write_json(path)?;
    }
    match format {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Table => {
            println!("{}", report.summary());
            for failure in &report.failures {
                println!(
                    "  FAILED {}:{}: {}",
                    failure.section, failure.display_name, failure.reason
                );
            }
            for drift in &report.drift {
                println!(
                    "  DRIFT  {}: '{}' is now '{}'",
                    drift.section, drift.stored, drift.canonical
                );
            }
        },
    }
    Ok(CommandOutcome::from_failures(report.has_failures()))
}

/// Repopulates the identifier cache.
pub fn cmd_populate(
    services: &ServiceContainer,
    report_path: Option<&Path>,
    format: OutputFormat,
) -> Result<CommandOutcome> {
    let watchlist = services.watchlist()?;
    let report = batch::populate(services.resolver(), &watchlist);
    if let Some(path) = report_path {
        report.write_json(path)?;
    }
    match format {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Table => {
            println!("{}", report.summary());
            for change in &report.new {
                println!(
                    "  NEW     {}:{} -> {} ({})",
                    change.section, change.display_name, change.identifier, change.provenance
                );
            }
            for change in &report.changed {
                let previous = change
                    .previous
                    .as_ref()
                    .map_or_else(|| "-".to_string(), ToString::to_string);
                println!(
                    "  CHANGED {}:{} {previous} -> {} ({})",
                    change.section, change.display_name, change.identifier, change.provenance
                );
            }
            for failure in &report.failed {
                println!(
                    "  FAILED  {}:{}: {}",
                    failure.section, failure.display_name, failure.reason
                );
            }
        },
    }
    Ok(CommandOutcome::from_failures(report.has_failures()))
}

/// Prints planned and live identifiers for every watchlist object.
pub fn cmd_diagnose(services: &ServiceContainer, format: OutputFormat) -> Result<CommandOutcome> {
    let watchlist = services.watchlist()?;
    let rows = batch::diagnose(services.resolver(), &watchlist);
    match format {
        OutputFormat::Json => println!("{}", to_json(&rows)?),
        OutputFormat::Table => print!("{}", batch::render_table(&rows)),
    }
    let failed = rows.iter().any(|row| !row.result.is_success());
    Ok(CommandOutcome::from_failures(failed))
}
