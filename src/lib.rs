//! # Skycascade
//!
//! Resolves a curated watchlist of comets and asteroids to identifiers and
//! positions from the JPL Horizons ephemeris service, without tripping the
//! provider's rate limiter and without persisting identifiers Horizons will
//! never accept.
//!
//! ## Components
//!
//! - [`resolver::IdentityResolver`]: override → identifier cache → name
//!   heuristics → SBDB cross-reference, each candidate validated live
//! - [`executor::FetchExecutor`]: bounded (3 in flight) single-retry fetches
//! - [`guard::IdentifierGuard`]: rejects the SBDB reserved identifier band
//! - [`storage::EphemerisCache`]: time-boxed daily positions, rebuilt by
//!   [`batch::EphemerisRebuilder`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use skycascade::{Section, services::ServiceContainer};
//!
//! let services = ServiceContainer::from_config(&config)?;
//! let result = services.resolver().resolve("433 Eros", Section::Asteroid);
//! if result.is_success() {
//!     println!("{:?}", result.identifier);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod batch;
pub mod cli;
pub mod config;
pub mod executor;
pub mod guard;
pub mod models;
pub mod observability;
pub mod provider;
pub mod resolver;
pub mod services;
pub mod storage;

pub use config::SkycascadeConfig;
pub use executor::{FetchExecutor, FetchRequest, FetchResult, FetchStatus};
pub use guard::{GuardVerdict, IdentifierGuard};
pub use models::{
    Identifier, IdentityDrift, ObjectKey, Position, Provenance, ResolutionResult,
    ResolutionStatus, Sample, Section, WatchlistEntry,
};
pub use resolver::IdentityResolver;
pub use storage::{EphemerisCache, IdentifierCache, LookupOutcome};

/// Error type for skycascade operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unknown section names, unparsable dates, empty names |
/// | `OperationFailed` | I/O, serialization, HTTP transport, config parsing |
/// | `RateLimited` | Provider answered 429/503 or reported throttling |
/// | `ObjectNotFound` | Provider rejected a candidate identifier |
/// | `InvalidIdentifier` | The identifier guard rejected an identifier |
/// | `ResolutionExhausted` | Every cascade stage failed for an object |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Cache or watchlist files cannot be read, parsed or written
    /// - The HTTP transport fails (connect, timeout, malformed body)
    /// - Observability was initialized twice
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The provider throttled the request.
    ///
    /// Transient: the executor retries it once before reporting a failure.
    #[error("rate limited by {provider}: {cause}")]
    RateLimited {
        /// Provider name.
        provider: &'static str,
        /// Provider message or HTTP status.
        cause: String,
    },

    /// The provider does not know (or cannot disambiguate) an identifier.
    #[error("{identifier} not accepted by provider: {cause}")]
    ObjectNotFound {
        /// The rejected identifier.
        identifier: String,
        /// Provider message.
        cause: String,
    },

    /// The identifier guard rejected an identifier.
    ///
    /// Non-fatal to a cascade: the candidate is discarded and never persisted.
    #[error("invalid identifier {identifier}: {reason}")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
        /// Why the guard rejected it.
        reason: String,
    },

    /// No cascade stage produced a validated identifier.
    #[error("could not resolve {display_name} (tried: {})", attempted.join(", "))]
    ResolutionExhausted {
        /// The watchlist display name.
        display_name: String,
        /// Every identifier sent for validation, in order.
        attempted: Vec<String>,
    },
}

impl Error {
    /// Builds an `OperationFailed` error from any displayable cause.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Returns `true` for provider throttling.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Result type alias for skycascade operations.
pub type Result<T> = std::result::Result<T, Error>;
