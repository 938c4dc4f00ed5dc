//! Offline batch jobs driven by CI or an operator.
//!
//! - [`EphemerisRebuilder`]: sequential ephemeris cache rebuild with drift
//!   detection
//! - [`populate()`]: identifier cache repopulation on the worker pool
//! - [`diagnose()`]: planned vs. live identifiers per watchlist object

pub mod diagnose;
pub mod drift;
mod populate;
mod rebuild;

pub use diagnose::{DiagnosisRow, diagnose, render_table};
pub use populate::{IdentifierChange, PopulateReport, populate};
pub use rebuild::{
    DEFAULT_REQUEST_DELAY_MS, DEFAULT_WINDOW_DAYS, EphemerisRebuilder, RebuildConfig,
    RebuildReport,
};

use std::time::Duration;

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts usize to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn u64_to_f64(value: u64) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
