//! In-flight cap for calls to the primary ephemeris service.
//!
//! Horizons' rate limiter punishes burst concurrency rather than volume: at 8
//! concurrent requests roughly half of them fail even though each identifier
//! resolves fine on its own. Every call to the provider therefore holds a
//! permit from one process-wide semaphore capped at [`MAX_IN_FLIGHT`].
//!
//! The bulkhead is cheap to clone; clones share the same permits, so the cap
//! holds across concurrent batches and interactive lookups.

use crate::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Hard ceiling on simultaneous provider requests.
pub const MAX_IN_FLIGHT: usize = 3;

/// Upper bound on waiting for a permit when no timeout is configured.
const UNBOUNDED_WAIT_CAP: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the provider bulkhead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadConfig {
    /// Maximum concurrent provider calls, clamped to `1..=MAX_IN_FLIGHT`.
    ///
    /// Default: 3.
    pub max_concurrent: usize,

    /// Timeout for acquiring a permit (0 = wait up to five minutes).
    ///
    /// Default: 60 seconds.
    pub acquire_timeout_ms: u64,

    /// Fail immediately instead of waiting when every permit is taken.
    ///
    /// Default: false.
    pub fail_fast: bool,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkheadConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_concurrent: MAX_IN_FLIGHT,
            acquire_timeout_ms: 60_000,
            fail_fast: false,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `SKYCASCADE_MAX_CONCURRENT` | Max in-flight provider calls (≤ 3) | 3 |
    /// | `SKYCASCADE_ACQUIRE_TIMEOUT_MS` | Permit timeout | 60000 |
    /// | `SKYCASCADE_BULKHEAD_FAIL_FAST` | Fail when full | false |
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(parsed) = env_parse::<usize>("SKYCASCADE_MAX_CONCURRENT") {
            self.max_concurrent = parsed;
        }
        if let Some(parsed) = env_parse::<u64>("SKYCASCADE_ACQUIRE_TIMEOUT_MS") {
            self.acquire_timeout_ms = parsed;
        }
        if let Ok(v) = std::env::var("SKYCASCADE_BULKHEAD_FAIL_FAST") {
            self.fail_fast = v.eq_ignore_ascii_case("true") || v == "1";
        }
        self
    }

    /// Sets the maximum concurrent calls.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the acquire timeout in milliseconds.
    #[must_use]
    pub const fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Sets fail-fast behaviour.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Effective permit count after clamping.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.max_concurrent.clamp(1, MAX_IN_FLIGHT)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Semaphore-backed concurrency limiter shared by every provider call.
#[derive(Debug, Clone)]
pub struct Bulkhead {
    config: BulkheadConfig,
    limit: usize,
    semaphore: Arc<Semaphore>,
}

impl Bulkhead {
    /// Creates a bulkhead.
    #[must_use]
    pub fn new(config: BulkheadConfig) -> Self {
        let limit = config.effective_limit();
        if limit != config.max_concurrent {
            tracing::warn!(
                requested = config.max_concurrent,
                effective = limit,
                "Bulkhead limit clamped"
            );
        }
        Self {
            config,
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Number of permits the bulkhead was created with.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the current number of available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn acquire_permit(&self, provider: &'static str) -> Result<OwnedSemaphorePermit> {
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("provider_bulkhead_available_permits", "provider" => provider)
            .set(self.available_permits() as f64);

        let deadline = if self.config.acquire_timeout_ms == 0 {
            UNBOUNDED_WAIT_CAP
        } else {
            Duration::from_millis(self.config.acquire_timeout_ms)
        };
        let start = Instant::now();

        loop {
            if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
                metrics::counter!("provider_bulkhead_permits_acquired_total", "provider" => provider)
                    .increment(1);
                return Ok(permit);
            }

            let reason = if self.config.fail_fast {
                Some("full")
            } else if start.elapsed() >= deadline {
                Some("timeout")
            } else {
                None
            };

            if let Some(reason) = reason {
                metrics::counter!(
                    "provider_bulkhead_rejections_total",
                    "provider" => provider,
                    "reason" => reason
                )
                .increment(1);
                return Err(Error::operation(
                    "provider_bulkhead_acquire",
                    format!(
                        "bulkhead {reason}: {} requests in flight (max: {}) after {}ms",
                        self.limit - self.available_permits(),
                        self.limit,
                        start.elapsed().as_millis()
                    ),
                ));
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Runs `call` while holding a permit.
    ///
    /// The permit is released as soon as `call` returns.
    pub fn execute<T, F>(&self, provider: &'static str, operation: &'static str, call: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let span = tracing::info_span!(
            "provider.bulkhead",
            provider = provider,
            operation = operation,
            available_permits = tracing::field::Empty
        );
        let _enter = span.enter();
        span.record("available_permits", self.available_permits());

        let _permit = self.acquire_permit(provider)?;
        tracing::debug!(provider, operation, "Acquired bulkhead permit");

        let result = call();

        tracing::debug!(
            provider,
            operation,
            success = result.is_ok(),
            "Released bulkhead permit"
        );
        result
    }
}
