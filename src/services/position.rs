//! Cache-first position lookups.

use crate::models::{Identifier, ObjectKey, Position, Provenance, Section};
use crate::resolver::IdentityResolver;
use crate::storage::{EphemerisCache, LookupOutcome, MissReason};
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Where a located position came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSource {
    /// The precomputed ephemeris cache; no network call was made.
    Cache,
    /// A live cascade run.
    Live,
}

impl fmt::Display for PositionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// A position for one object and date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Located {
    /// Object.
    pub key: ObjectKey,
    /// Requested date.
    pub date: NaiveDate,
    /// Position.
    pub position: Position,
    /// Visual magnitude, when the cached sample carried one.
    pub magnitude: Option<f64>,
    /// Source.
    pub source: PositionSource,
    /// Identifier used by a live lookup.
    pub identifier: Option<Identifier>,
    /// Cascade stage of a live lookup.
    pub provenance: Option<Provenance>,
    /// Why the cache was bypassed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_miss: Option<String>,
}

/// Answers "where is this object on this date", cache first.
#[derive(Clone)]
pub struct PositionService {
    cache: Arc<EphemerisCache>,
    resolver: IdentityResolver,
}

impl PositionService {
    /// Creates the service.
    #[must_use]
    pub const fn new(cache: Arc<EphemerisCache>, resolver: IdentityResolver) -> Self {
        Self { cache, resolver }
    }

    /// Cache-only lookup; never touches the network.
    #[must_use]
    pub fn cached(&self, display_name: &str, section: Section, date: NaiveDate) -> LookupOutcome {
        self.cache.lookup(&ObjectKey::new(section, display_name.trim()), date)
    }

    /// Returns the position from the cache when `date` is in its window,
    /// otherwise runs the cascade.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ResolutionExhausted`] when the cache misses
    /// and no cascade stage validates.
    #[instrument(name = "skycascade.locate", skip(self), fields(section = %section))]
    pub fn locate(&self, display_name: &str, section: Section, date: NaiveDate) -> Result<Located> {
        let key = ObjectKey::new(section, display_name.trim());
        let miss: MissReason = match self.cache.lookup(&key, date) {
            LookupOutcome::Hit(sample) => {
                return Ok(Located {
                    key,
                    date,
                    position: sample.position(),
                    magnitude: sample.magnitude,
                    source: PositionSource::Cache,
                    identifier: None,
                    provenance: None,
                    cache_miss: None,
                });
            },
            LookupOutcome::Miss(reason) => reason,
        };

        let result = self
            .resolver
            .resolve_at(&key.display_name, section, date)
            .into_strict()?;
        let position = result.position.ok_or_else(|| {
            crate::Error::operation("locate", format!("{key}: resolution carried no position"))
        })?;
        Ok(Located {
            key,
            date,
            position,
            magnitude: None,
            source: PositionSource::Live,
            identifier: result.identifier,
            provenance: result.provenance,
            cache_miss: Some(miss.to_string()),
        })
    }
}
