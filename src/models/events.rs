//! Cache lifecycle events for operators and the batch driver.

use super::{Identifier, Section};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical name diverging from the curated display name.
///
/// Reported for operator review; never applied automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDrift {
    /// Watchlist section.
    pub section: Section,
    /// Display name as stored in the watchlist.
    pub stored: String,
    /// Canonical full name returned by the lookup service.
    pub canonical: String,
}

/// Events emitted by the caches and batch jobs.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A rebuild observed a canonical name that differs from the display name.
    IdentityDriftDetected {
        /// The drift.
        drift: IdentityDrift,
        /// When it was observed.
        timestamp: DateTime<Utc>,
    },
    /// An identifier cache entry failed the guard and was removed.
    IdentifierPurged {
        /// Watchlist section.
        section: Section,
        /// Display name.
        display_name: String,
        /// The purged identifier.
        identifier: Identifier,
        /// Guard reason.
        reason: String,
    },
    /// The ephemeris cache was rebuilt and written.
    CacheRebuilt {
        /// Objects refreshed in this run.
        refreshed: usize,
        /// Objects that failed in this run.
        failed: usize,
        /// Drift conditions observed.
        drifted: usize,
    },
}

impl CacheEvent {
    /// Returns the event type string.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::IdentityDriftDetected { .. } => "identity_drift_detected",
            Self::IdentifierPurged { .. } => "identifier_purged",
            Self::CacheRebuilt { .. } => "cache_rebuilt",
        }
    }

    /// Creates a drift event stamped with the current time.
    #[must_use]
    pub fn drift(drift: IdentityDrift) -> Self {
        Self::IdentityDriftDetected {
            drift,
            timestamp: Utc::now(),
        }
    }
}
