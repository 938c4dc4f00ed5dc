//! Identifiers accepted by the primary ephemeris service and their provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker appended to a bare number so Horizons runs a small-body search
/// instead of selecting the major body with the same ID.
pub const SMALL_BODY_MARKER: char = ';';

/// Token used to select an object in the primary ephemeris service.
///
/// Distinct from any identifier used internally by other lookup services.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Creates a new identifier, trimming surrounding whitespace.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let raw: String = id.into();
        Self(raw.trim().to_string())
    }

    /// Creates a small-body search identifier (`"433"` → `"433;"`).
    #[must_use]
    pub fn small_body(token: &str) -> Self {
        let token = token.trim().trim_end_matches(SMALL_BODY_MARKER);
        Self(format!("{token}{SMALL_BODY_MARKER}"))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier without a trailing small-body marker.
    #[must_use]
    pub fn core(&self) -> &str {
        self.0.trim_end_matches(SMALL_BODY_MARKER).trim()
    }

    /// Returns `true` if the identifier forces a small-body search.
    #[must_use]
    pub fn has_small_body_marker(&self) -> bool {
        self.0.ends_with(SMALL_BODY_MARKER)
    }

    /// Returns the numeric value when the core is all digits.
    #[must_use]
    pub fn numeric(&self) -> Option<u64> {
        let core = self.core();
        if core.is_empty() || !core.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        core.parse().ok()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Cascade stage an identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Admin override table.
    Override,
    /// Previously validated identifier cache entry.
    Cache,
    /// Derived from the display name.
    Heuristic,
    /// Returned by the cross-reference service.
    SecondaryLookup,
}

impl Provenance {
    /// Returns the provenance tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Cache => "cache",
            Self::Heuristic => "heuristic",
            Self::SecondaryLookup => "secondary-lookup",
        }
    }

    /// Cascade position, 1-based.
    #[must_use]
    pub const fn stage(&self) -> u8 {
        match self {
            Self::Override => 1,
            Self::Cache => 2,
            Self::Heuristic => 3,
            Self::SecondaryLookup => 4,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Live identifier cache entry for one `(display_name, section)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierCacheEntry {
    /// Watchlist display name.
    pub display_name: String,
    /// Watchlist section.
    pub section: super::Section,
    /// Validated identifier.
    pub identifier: Identifier,
    /// Stage that first produced the identifier.
    pub provenance: Provenance,
    /// When the identifier last validated against the primary service.
    ///
    /// `None` for entries written by older tooling.
    pub validated_at: Option<DateTime<Utc>>,
}
