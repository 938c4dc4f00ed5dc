//! Watchlist sections, entries and object keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Watchlist section an object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// Comets (periodic, non-periodic, interstellar).
    #[serde(alias = "comets")]
    Comet,
    /// Asteroids and other minor planets.
    #[serde(alias = "asteroids")]
    Asteroid,
}

impl Section {
    /// Returns all sections in watchlist order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Comet, Self::Asteroid]
    }

    /// Returns the singular section name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Comet => "comet",
            Self::Asteroid => "asteroid",
        }
    }

    /// Returns the plural key used in the override, identifier cache and
    /// ephemeris cache files.
    #[must_use]
    pub const fn store_key(&self) -> &'static str {
        match self {
            Self::Comet => "comets",
            Self::Asteroid => "asteroids",
        }
    }

    /// Parses a section name (singular or plural, case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "comet" | "comets" => Some(Self::Comet),
            "asteroid" | "asteroids" | "minor-planet" => Some(Self::Asteroid),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Section {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::InvalidInput(format!("unknown section: {s}")))
    }
}

/// One object on the curated watchlist.
///
/// Owned by the watchlist configuration; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchlistEntry {
    /// Name exactly as curated (`"C/2024 G3 (ATLAS)"`, `"433 Eros"`).
    pub display_name: String,
    /// Section the entry was listed under.
    pub section: Section,
    /// Free-form alias note kept next to the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_comment: Option<String>,
}

impl WatchlistEntry {
    /// Creates an entry without an alias note.
    #[must_use]
    pub fn new(display_name: impl Into<String>, section: Section) -> Self {
        Self {
            display_name: display_name.into(),
            section,
            alias_comment: None,
        }
    }

    /// Sets the alias note.
    #[must_use]
    pub fn with_alias_comment(mut self, alias: impl Into<String>) -> Self {
        self.alias_comment = Some(alias.into());
        self
    }

    /// Returns the key this entry is cached under.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.section, &self.display_name)
    }
}

/// Cache key for one watchlist object: `(section, display_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Section.
    pub section: Section,
    /// Display name.
    pub display_name: String,
}

impl ObjectKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(section: Section, display_name: impl Into<String>) -> Self {
        Self {
            section,
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.section, self.display_name)
    }
}
