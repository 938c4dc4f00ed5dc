//! CLI command implementations.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resolve` | Run the identity cascade for one object |
//! | `locate` | Position for a date, ephemeris cache first |
//! | `lookup` | Ephemeris-cache-only lookup (no network) |
//! | `rebuild` | Sequential ephemeris cache rebuild |
//! | `populate` | Identifier cache repopulation over the watchlist |
//! | `diagnose` | Planned vs. live identifier per object |
//! | `guard` | Identifier guard verdict |
//!
//! # Example Usage
//!
//! ```bash
//! skycascade resolve "2033 (Basilea)" --section asteroid
//! skycascade locate "C/2024 G3 (ATLAS)" --section comet --date 2026-04-01
//! skycascade rebuild --window-days 30 --report rebuild.json
//! ```

mod batch;
mod locate;
mod resolve;

pub use batch::{cmd_diagnose, cmd_populate, cmd_rebuild};
pub use locate::{cmd_locate, cmd_lookup};
pub use resolve::{cmd_guard, cmd_resolve};

use crate::{Error, Result};
use chrono::{NaiveDate, Utc};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text (default).
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses output format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Whether a command completed cleanly. Drives the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Everything succeeded.
    Clean,
    /// The command ran, but some objects failed or were rejected.
    Degraded,
}

impl CommandOutcome {
    /// `Degraded` when `failed` is set.
    #[must_use]
    pub const fn from_failures(failed: bool) -> Self {
        if failed { Self::Degraded } else { Self::Clean }
    }
}

/// Parses `YYYY-MM-DD` or `today` (UTC). `None` means today.
pub fn parse_date(value: Option<&str>) -> Result<NaiveDate> {
    match value.map(str::trim) {
        None | Some("" | "today") => Ok(Utc::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| Error::InvalidInput(format!("invalid date '{s}': {e}"))),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::operation("serialize_output", e))
}
