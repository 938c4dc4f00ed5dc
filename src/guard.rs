//! Identifier cache guard.
//!
//! SBDB represents "linked to a catalog-numbered body" objects with SPK-IDs in
//! a reserved band (`20_000_000..=29_999_999`). Horizons never accepts those
//! IDs even though SBDB returns them as if usable, so they must never reach
//! the identifier cache.
//!
//! The rule is a closed numeric interval, not a prefix match: comet SPK-IDs
//! (`1_000_000..2_000_000`), numbered-asteroid SPK-IDs (`2_000_000 + n`),
//! comet apparition records (`90_000_000+`) and fragment designations such as
//! `73P-B` all sit close to the band and are valid.
//!
//! Every cache write, every cache read and the resolver's secondary stage go
//! through [`IdentifierGuard::validate`].

use crate::models::{Identifier, Section};
use crate::{Error, Result};
use std::ops::RangeInclusive;

/// SBDB SPK-IDs Horizons never accepts.
pub const RESERVED_BAND: RangeInclusive<u64> = 20_000_000..=29_999_999;

/// Base of Horizons numbered-asteroid SPK-IDs (`2_000_000 + number`).
pub const NUMBERED_ASTEROID_BASE: u64 = 2_000_000;

/// Verdict returned by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Safe to persist and send to Horizons.
    Accepted,
    /// Must not be persisted.
    Rejected {
        /// Why.
        reason: String,
    },
}

impl GuardVerdict {
    /// Returns `true` for [`GuardVerdict::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Synchronous validator for identifiers headed to the identifier cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierGuard;

impl IdentifierGuard {
    /// Creates the guard.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an identifier.
    #[must_use]
    pub fn validate(&self, identifier: &Identifier) -> GuardVerdict {
        if identifier.core().is_empty() {
            return reject(identifier, "empty identifier");
        }
        match identifier.numeric() {
            Some(id) if RESERVED_BAND.contains(&id) => reject(
                identifier,
                "SBDB linked-body ID in reserved band 20000000..=29999999",
            ),
            _ => GuardVerdict::Accepted,
        }
    }

    /// Validates an identifier, mapping a rejection to
    /// [`Error::InvalidIdentifier`].
    pub fn check(&self, identifier: &Identifier) -> Result<()> {
        match self.validate(identifier) {
            GuardVerdict::Accepted => Ok(()),
            GuardVerdict::Rejected { reason } => Err(Error::InvalidIdentifier {
                identifier: identifier.to_string(),
                reason,
            }),
        }
    }

    /// Translates a reserved-band SBDB asteroid ID into the Horizons
    /// numbered-asteroid SPK-ID (`20000433` → `2000433`).
    ///
    /// Returns `None` for comets, for IDs outside the band and when the
    /// translation itself fails the guard.
    #[must_use]
    pub fn remap_linked(&self, identifier: &Identifier, section: Section) -> Option<Identifier> {
        if section != Section::Asteroid {
            return None;
        }
        let id = identifier.numeric().filter(|id| RESERVED_BAND.contains(id))?;
        let number = id - RESERVED_BAND.start();
        let remapped = Identifier::new((NUMBERED_ASTEROID_BASE + number).to_string());
        self.validate(&remapped).is_accepted().then_some(remapped)
    }
}

fn reject(identifier: &Identifier, reason: &str) -> GuardVerdict {
    metrics::counter!("identifier_guard_rejections_total").increment(1);
    tracing::warn!(identifier = %identifier, reason, "Identifier guard rejected identifier");
    GuardVerdict::Rejected {
        reason: reason.to_string(),
    }
}
