//! Network providers.
//!
//! - [`HorizonsClient`]: the primary ephemeris service; every candidate
//!   identifier is validated against it
//! - [`SbdbClient`]: the cross-reference service used as the last cascade
//!   stage and for drift detection
//!
//! Both sit behind traits so the resolver, executor and batch jobs can be
//! driven by in-memory fakes.

mod bulkhead;
mod horizons;
mod retry;
mod sbdb;

pub use bulkhead::{Bulkhead, BulkheadConfig, MAX_IN_FLIGHT};
pub use horizons::{HorizonsClient, HorizonsConfig, parse_ephemeris};
pub use retry::{Attempted, MAX_ATTEMPTS, RetryPolicy};
pub use sbdb::{SbdbClient, SbdbConfig};

use crate::executor::FetchRequest;
use crate::models::{Identifier, Sample};
use crate::{Error, Result};
use std::time::Duration;

/// Primary ephemeris service.
pub trait EphemerisProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Fetches daily samples for the request's identifier and span.
    ///
    /// # Errors
    ///
    /// - [`Error::ObjectNotFound`] when the service rejects the identifier
    /// - [`Error::RateLimited`] when the service throttles the request
    /// - [`Error::OperationFailed`] on transport or format failures
    fn ephemerides(&self, request: &FetchRequest) -> Result<Vec<Sample>>;
}

/// Canonical name and internal identifier returned by the cross-reference
/// service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReference {
    /// Canonical full name (`"433 Eros (A898 PA)"`).
    pub canonical_full_name: String,
    /// The service's internal identifier; must pass the guard before use.
    pub internal_identifier: Identifier,
}

/// Cross-reference lookup service.
pub trait CrossReferenceLookup: Send + Sync {
    /// Service name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Looks an object up by name. `Ok(None)` means no unique match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimited`] or [`Error::OperationFailed`] when the
    /// lookup could not be performed.
    fn lookup(&self, query: &str) -> Result<Option<CrossReference>>;
}

/// HTTP client configuration shared by both providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl HttpConfig {
    /// Applies `SKYCASCADE_HTTP_TIMEOUT_MS` and
    /// `SKYCASCADE_HTTP_CONNECT_TIMEOUT_MS`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("SKYCASCADE_HTTP_TIMEOUT_MS") {
            if let Ok(timeout_ms) = v.parse::<u64>() {
                self.timeout_ms = timeout_ms;
            }
        }
        if let Ok(v) = std::env::var("SKYCASCADE_HTTP_CONNECT_TIMEOUT_MS") {
            if let Ok(connect_timeout_ms) = v.parse::<u64>() {
                self.connect_timeout_ms = connect_timeout_ms;
            }
        }
        self
    }
}

/// Builds a blocking HTTP client with the configured timeouts.
#[must_use]
pub fn build_http_client(config: HttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(concat!("skycascade/", env!("CARGO_PKG_VERSION")));
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Maps a reqwest transport error to [`Error::OperationFailed`], logging the
/// failure class.
pub(crate) fn transport_error(provider: &'static str, operation: &str, e: &reqwest::Error) -> Error {
    let error_kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_request() {
        "request"
    } else if e.is_decode() {
        "decode"
    } else {
        "unknown"
    };
    tracing::error!(
        provider,
        error = %e,
        error_kind,
        is_timeout = e.is_timeout(),
        is_connect = e.is_connect(),
        "Provider request failed"
    );
    Error::operation(operation, format!("{error_kind} error: {e}"))
}

/// Returns `true` for HTTP statuses the providers use to signal throttling.
pub(crate) fn is_throttle_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.connect_timeout_ms, 5_000);
    }

    #[test]
    fn test_throttle_statuses() {
        assert!(is_throttle_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_throttle_status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_throttle_status(reqwest::StatusCode::BAD_REQUEST));
    }
}
