//! Data models for skycascade.
//!
//! Watchlist entries, identifiers, ephemeris samples, resolution results and
//! cache events shared by every component.

mod ephemeris;
mod events;
mod identifier;
mod resolution;
mod watchlist;

pub use ephemeris::{EphemerisCacheEntry, Position, Sample};
pub use events::{CacheEvent, IdentityDrift};
pub use identifier::{Identifier, IdentifierCacheEntry, Provenance, SMALL_BODY_MARKER};
pub use resolution::{
    CandidateFailure, CandidateFailureReason, ObjectFailure, ResolutionResult, ResolutionStatus,
};
pub use watchlist::{ObjectKey, Section, WatchlistEntry};
