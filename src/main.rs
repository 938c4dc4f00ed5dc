//! Binary entry point for skycascade.
//!
//! Resolves watchlist objects to Horizons identifiers and maintains the
//! identifier and ephemeris caches.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use skycascade::cli::{self, CommandOutcome, OutputFormat};
use skycascade::config::SkycascadeConfig;
use skycascade::models::Section;
use skycascade::observability;
use skycascade::services::ServiceContainer;
use std::path::PathBuf;
use std::process::ExitCode;

/// Skycascade - identifier resolution and ephemeris caching for a sky watchlist.
#[derive(Parser)]
#[command(name = "skycascade")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format: table or json.
    #[arg(short, long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Resolve a display name to a Horizons identifier.
    Resolve {
        /// Display name as it appears in the watchlist.
        name: String,

        /// Watchlist section: comet or asteroid.
        #[arg(short, long)]
        section: Section,

        /// Validation date (YYYY-MM-DD, default today).
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Position on a date, ephemeris cache first.
    Locate {
        /// Display name.
        name: String,

        /// Watchlist section: comet or asteroid.
        #[arg(short, long)]
        section: Section,

        /// Date (YYYY-MM-DD, default today).
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Ephemeris cache lookup without network access.
    Lookup {
        /// Display name.
        name: String,

        /// Watchlist section: comet or asteroid.
        #[arg(short, long)]
        section: Section,

        /// Date (YYYY-MM-DD, default today).
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Rebuild the ephemeris cache for the whole watchlist.
    Rebuild {
        /// Window length in days.
        #[arg(short, long)]
        window_days: Option<u32>,

        /// Write the run report as JSON to this path.
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Repopulate the identifier cache from the watchlist.
    Populate {
        /// Write the run report as JSON to this path.
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show planned and live identifiers for every watchlist object.
    Diagnose,

    /// Check an identifier against the cache guard.
    Guard {
        /// Identifier to check.
        identifier: String,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match SkycascadeConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = config.logging.clone().with_verbose(cli.verbose);
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config) {
        Ok(CommandOutcome::Clean) => ExitCode::SUCCESS,
        Ok(CommandOutcome::Degraded) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &SkycascadeConfig) -> skycascade::Result<CommandOutcome> {
    let format = OutputFormat::parse(&cli.format);

    // The guard needs no services, so it works without a data directory.
    if let Commands::Guard { identifier } = &cli.command {
        return cli::cmd_guard(identifier, format);
    }

    let services = ServiceContainer::from_config(config)?;
    match cli.command {
        Commands::Resolve {
            name,
            section,
            date,
        } => cli::cmd_resolve(&services, &name, section, date.as_deref(), format),

        Commands::Locate {
            name,
            section,
            date,
        } => cli::cmd_locate(&services, &name, section, date.as_deref(), format),

        Commands::Lookup {
            name,
            section,
            date,
        } => cli::cmd_lookup(&services, &name, section, date.as_deref(), format),

        Commands::Rebuild {
            window_days,
            report,
        } => cli::cmd_rebuild(&services, window_days, report.as_deref(), format),

        Commands::Populate { report } => cli::cmd_populate(&services, report.as_deref(), format),

        Commands::Diagnose => cli::cmd_diagnose(&services, format),

        Commands::Guard { identifier } => cli::cmd_guard(&identifier, format),
    }
}
