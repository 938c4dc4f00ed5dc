//! Ephemeris samples and cached per-object windows.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Equatorial position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Right ascension, degrees.
    pub ra_deg: f64,
    /// Declination, degrees.
    pub dec_deg: f64,
}

/// One dated ephemeris sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// UTC calendar date of the sample (00:00 UT).
    pub date: NaiveDate,
    /// Right ascension, degrees.
    #[serde(rename = "ra")]
    pub ra_deg: f64,
    /// Declination, degrees.
    #[serde(rename = "dec")]
    pub dec_deg: f64,
    /// Visual magnitude (comet total magnitude or asteroid V), when reported.
    #[serde(default, rename = "vmag")]
    pub magnitude: Option<f64>,
}

impl Sample {
    /// Returns the sample's position.
    #[must_use]
    pub const fn position(&self) -> Position {
        Position {
            ra_deg: self.ra_deg,
            dec_deg: self.dec_deg,
        }
    }
}

/// Precomputed window of daily samples for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisCacheEntry {
    /// First covered date.
    pub generated_at: NaiveDate,
    /// Number of covered days from `generated_at`.
    pub window_days: u32,
    /// Samples ordered by date.
    pub samples: Vec<Sample>,
}

impl EphemerisCacheEntry {
    /// Creates an entry, sorting samples by date.
    #[must_use]
    pub fn new(generated_at: NaiveDate, window_days: u32, mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.date);
        Self {
            generated_at,
            window_days,
            samples,
        }
    }

    /// Exclusive end of the covered window.
    #[must_use]
    pub fn window_end(&self) -> NaiveDate {
        self.generated_at
            .checked_add_days(Days::new(u64::from(self.window_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Returns `true` if `date` lies in `[generated_at, generated_at + window_days)`.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.generated_at && date < self.window_end()
    }
}
