//! Rate-limited fetch executor.
//!
//! Every call to the primary ephemeris service goes through
//! [`FetchExecutor::fetch`]: one attempt under a bulkhead permit, and on
//! failure one retry after a fixed backoff (see [`RetryPolicy`]). Failures
//! come back as [`FetchStatus::Failed`] values, so a batch never errors
//! because of one bad object.
//!
//! [`FetchExecutor::run_pool`] is the fixed-size worker pool used for whole
//! watchlists. The pool size and the bulkhead are both capped at
//! [`MAX_IN_FLIGHT`], so a batch of any size never has more than three
//! requests in flight.

use crate::Error;
use crate::models::{Identifier, Sample, Section};
use crate::provider::{
    Attempted, Bulkhead, BulkheadConfig, EphemerisProvider, MAX_IN_FLIGHT, RetryPolicy,
};
use chrono::{Days, NaiveDate};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::instrument;

/// Dates covered by one request, at daily granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateSpan {
    /// A single day.
    Date(NaiveDate),
    /// `days` consecutive days starting at `start`.
    Range {
        /// First day.
        start: NaiveDate,
        /// Number of days (at least one).
        days: u32,
    },
}

impl DateSpan {
    /// Creates a range span of at least one day.
    #[must_use]
    pub fn range(start: NaiveDate, days: u32) -> Self {
        Self::Range {
            start,
            days: days.max(1),
        }
    }

    /// First covered day.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        match self {
            Self::Date(date) | Self::Range { start: date, .. } => *date,
        }
    }

    /// Number of covered days.
    #[must_use]
    pub fn days(&self) -> u32 {
        match self {
            Self::Date(_) => 1,
            Self::Range { days, .. } => (*days).max(1),
        }
    }

    /// First day after the span.
    #[must_use]
    pub fn end_exclusive(&self) -> NaiveDate {
        self.start()
            .checked_add_days(Days::new(u64::from(self.days())))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Returns `true` if `date` lies in the span.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start() && date < self.end_exclusive()
    }
}

/// One request to the primary ephemeris service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    /// Identifier to select the object.
    pub identifier: Identifier,
    /// Watchlist section (drives comet apparition selection).
    pub section: Section,
    /// Requested dates.
    pub span: DateSpan,
}

impl FetchRequest {
    /// Creates a single-date request.
    #[must_use]
    pub fn on_date(identifier: Identifier, section: Section, date: NaiveDate) -> Self {
        Self {
            identifier,
            section,
            span: DateSpan::Date(date),
        }
    }

    /// Creates a window request at daily step.
    #[must_use]
    pub fn window(identifier: Identifier, section: Section, start: NaiveDate, days: u32) -> Self {
        Self {
            identifier,
            section,
            span: DateSpan::range(start, days),
        }
    }
}

/// Failure class of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchFailureKind {
    /// The provider throttled the request.
    RateLimited,
    /// The provider does not accept the identifier.
    Rejected,
    /// Transport, timeout, bulkhead or response-format failure.
    Transport,
}

impl FetchFailureKind {
    /// Returns the kind as a metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Rejected => "rejected",
            Self::Transport => "transport",
        }
    }
}

/// Final failure of a fetch after all attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Failure class of the last attempt.
    pub kind: FetchFailureKind,
    /// Error message of the last attempt.
    pub message: String,
}

impl From<&Error> for FetchFailure {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::RateLimited { .. } => FetchFailureKind::RateLimited,
            Error::ObjectNotFound { .. } | Error::InvalidIdentifier { .. } => {
                FetchFailureKind::Rejected
            },
            _ => FetchFailureKind::Transport,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// Explicit outcome of a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    /// The provider returned samples.
    Success {
        /// Samples in date order.
        samples: Vec<Sample>,
    },
    /// Every attempt failed.
    Failed {
        /// Failure of the final attempt.
        failure: FetchFailure,
    },
}

/// Result of one [`FetchRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// The request.
    pub request: FetchRequest,
    /// Outcome.
    pub status: FetchStatus,
    /// Attempts made (1 or 2 with the default policy).
    pub attempts: u32,
}

impl FetchResult {
    /// Returns `true` on success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, FetchStatus::Success { .. })
    }

    /// Samples on success.
    #[must_use]
    pub fn samples(&self) -> Option<&[Sample]> {
        match &self.status {
            FetchStatus::Success { samples } => Some(samples),
            FetchStatus::Failed { .. } => None,
        }
    }

    /// Failure on failure.
    #[must_use]
    pub const fn failure(&self) -> Option<&FetchFailure> {
        match &self.status {
            FetchStatus::Success { .. } => None,
            FetchStatus::Failed { failure } => Some(failure),
        }
    }
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Worker pool size, clamped to `1..=MAX_IN_FLIGHT`.
    pub workers: usize,
    /// Provider bulkhead.
    pub bulkhead: BulkheadConfig,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: MAX_IN_FLIGHT,
            bulkhead: BulkheadConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    /// Loads configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `SKYCASCADE_WORKERS` plus the bulkhead and retry overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("SKYCASCADE_WORKERS") {
            if let Ok(parsed) = v.parse::<usize>() {
                self.workers = parsed;
            }
        }
        self.bulkhead = self.bulkhead.with_env_overrides();
        self.retry = self.retry.with_env_overrides();
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the bulkhead configuration.
    #[must_use]
    pub fn with_bulkhead(mut self, bulkhead: BulkheadConfig) -> Self {
        self.bulkhead = bulkhead;
        self
    }
}

/// Bounded-concurrency, single-retry wrapper around the ephemeris provider.
#[derive(Clone)]
pub struct FetchExecutor {
    provider: Arc<dyn EphemerisProvider>,
    bulkhead: Bulkhead,
    retry: RetryPolicy,
    workers: usize,
}

impl FetchExecutor {
    /// Creates an executor with its own bulkhead.
    #[must_use]
    pub fn new(provider: Arc<dyn EphemerisProvider>, config: ExecutorConfig) -> Self {
        let bulkhead = Bulkhead::new(config.bulkhead.clone());
        Self::with_bulkhead(provider, config, bulkhead)
    }

    /// Creates an executor sharing an existing bulkhead.
    #[must_use]
    pub fn with_bulkhead(
        provider: Arc<dyn EphemerisProvider>,
        config: ExecutorConfig,
        bulkhead: Bulkhead,
    ) -> Self {
        Self {
            provider,
            bulkhead,
            retry: config.retry,
            workers: config.workers.clamp(1, MAX_IN_FLIGHT),
        }
    }

    /// Worker pool size.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// The retry policy in force.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetches one request with a single retry on failure.
    #[instrument(
        skip(self, request),
        fields(identifier = %request.identifier, section = %request.section)
    )]
    pub fn fetch(&self, request: FetchRequest) -> FetchResult {
        let provider = self.provider.name();
        let Attempted { result, attempts } = self.retry.run("fetch_ephemerides", |attempt| {
            tracing::debug!(attempt, "Fetching ephemeris");
            self.bulkhead
                .execute(provider, "ephemerides", || self.provider.ephemerides(&request))
        });

        let status = match result {
            Ok(samples) => FetchStatus::Success { samples },
            Err(err) => {
                let failure = FetchFailure::from(&err);
                metrics::counter!(
                    "fetch_failures_total",
                    "provider" => provider,
                    "kind" => failure.kind.as_str()
                )
                .increment(1);
                FetchStatus::Failed { failure }
            },
        };

        FetchResult {
            request,
            status,
            attempts,
        }
    }

    /// Fetches a batch on the worker pool. Results are in input order.
    pub fn fetch_batch(&self, requests: Vec<FetchRequest>) -> Vec<FetchResult> {
        let span = tracing::info_span!("executor.fetch_batch", requests = requests.len());
        let _enter = span.enter();
        let results = self.run_pool(requests, |request| self.fetch(request));
        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(total = results.len(), failed, "Fetch batch complete");
        results
    }

    /// Runs `work` over `items` on the fixed-size worker pool.
    ///
    /// Results are returned in input order. Provider calls made by `work`
    /// still pass through the shared bulkhead.
    pub fn run_pool<I, O, F>(&self, items: Vec<I>, work: F) -> Vec<O>
    where
        I: Send,
        O: Send,
        F: Fn(I) -> O + Sync,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = self.workers.min(total);
        let queue = Mutex::new(items.into_iter().enumerate());
        let slots: Mutex<Vec<Option<O>>> = Mutex::new((0..total).map(|_| None).collect());

        std::thread::scope(|s| {
            for worker in 0..workers {
                let (queue, slots, work) = (&queue, &slots, &work);
                s.spawn(move || {
                    let mut handled = 0_usize;
                    loop {
                        let next = queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .next();
                        let Some((index, item)) = next else {
                            break;
                        };
                        let output = work(item);
                        slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(output);
                        handled += 1;
                    }
                    tracing::trace!(worker, handled, "Pool worker finished");
                });
            }
        });

        slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .flatten()
            .collect()
    }
}
