//! Persistence for the identifier cache, the ephemeris cache and the
//! read-only watchlist files.
//!
//! Both caches are whole-file replace targets written with temp-file plus
//! rename; see [`atomic`].

pub mod atomic;
mod ephemeris_cache;
mod identifier_cache;
pub mod watchlist;

pub use ephemeris_cache::{EPHEMERIS_CACHE_FILE, EphemerisCache, LookupOutcome, MissReason};
pub use identifier_cache::{IDENTIFIER_CACHE_FILE, IdentifierCache};
pub use watchlist::{load_section, load_watchlist};
