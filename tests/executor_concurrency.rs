//! Concurrency and retry behaviour of the fetch executor.
//!
//! - No more than three requests are ever in flight, whether callers use the
//!   worker pool or share the bulkhead from their own threads
//! - A failed fetch is retried exactly once after the backoff
//! - Results come back in input order

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::NaiveDate;
use skycascade::executor::{ExecutorConfig, FetchExecutor, FetchFailureKind, FetchRequest};
use skycascade::models::{Identifier, Sample, Section};
use skycascade::provider::{Bulkhead, BulkheadConfig, EphemerisProvider, MAX_IN_FLIGHT, RetryPolicy};
use skycascade::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
}

fn sample(date: NaiveDate) -> Sample {
    Sample {
        date,
        ra_deg: 120.5,
        dec_deg: 12.25,
        magnitude: Some(11.2),
    }
}

fn requests(n: usize) -> Vec<FetchRequest> {
    (0..n)
        .map(|i| FetchRequest::on_date(Identifier::small_body(&i.to_string()), Section::Asteroid, day()))
        .collect()
}

/// Tracks how many calls are inside `ephemerides` at once.
struct SlowProvider {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowProvider {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

impl EphemerisProvider for SlowProvider {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn ephemerides(&self, request: &FetchRequest) -> Result<Vec<Sample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![sample(request.span.start())])
    }
}

/// Fails the first `failures` calls per identifier, then succeeds.
struct FlakyProvider {
    failures: usize,
    rate_limited: bool,
    calls: Mutex<HashMap<String, usize>>,
    call_times: Mutex<Vec<Instant>>,
}

impl FlakyProvider {
    fn new(failures: usize, rate_limited: bool) -> Self {
        Self {
            failures,
            rate_limited,
            calls: Mutex::new(HashMap::new()),
            call_times: Mutex::new(Vec::new()),
        }
    }

    fn calls_for(&self, id: &str) -> usize {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

impl EphemerisProvider for FlakyProvider {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn ephemerides(&self, request: &FetchRequest) -> Result<Vec<Sample>> {
        self.call_times.lock().unwrap().push(Instant::now());
        let seen = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(request.identifier.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if seen <= self.failures {
            if self.rate_limited {
                return Err(Error::RateLimited {
                    provider: "flaky",
                    cause: "HTTP 503".to_string(),
                });
            }
            return Err(Error::operation("horizons_request", "timeout error"));
        }
        Ok(vec![sample(request.span.start())])
    }
}

#[test]
fn test_pool_never_exceeds_three_in_flight() {
    let provider = Arc::new(SlowProvider::new(Duration::from_millis(40)));
    let executor = FetchExecutor::new(provider.clone(), ExecutorConfig::default());

    let results = executor.fetch_batch(requests(10));

    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 10);
    let peak = provider.peak.load(Ordering::SeqCst);
    assert!(peak <= MAX_IN_FLIGHT, "peak in flight was {peak}");
    assert!(peak >= 2, "pool did not run concurrently (peak {peak})");
}

#[test]
fn test_batch_results_follow_input_order() {
    let provider = Arc::new(SlowProvider::new(Duration::from_millis(5)));
    let executor = FetchExecutor::new(provider, ExecutorConfig::default());
    let input = requests(7);

    let results = executor.fetch_batch(input.clone());

    let order: Vec<_> = results.iter().map(|r| r.request.clone()).collect();
    assert_eq!(order, input);
}

#[test]
fn test_shared_bulkhead_caps_independent_callers() {
    let provider = Arc::new(SlowProvider::new(Duration::from_millis(30)));
    let bulkhead = Bulkhead::new(BulkheadConfig::default());
    let interactive = FetchExecutor::with_bulkhead(provider.clone(), ExecutorConfig::default(), bulkhead.clone());
    let batch = FetchExecutor::with_bulkhead(provider.clone(), ExecutorConfig::default(), bulkhead);

    thread::scope(|s| {
        for i in 0..6 {
            let executor = if i % 2 == 0 { &interactive } else { &batch };
            s.spawn(move || {
                let result = executor.fetch(FetchRequest::on_date(
                    Identifier::small_body(&i.to_string()),
                    Section::Asteroid,
                    day(),
                ));
                assert!(result.is_success());
            });
        }
    });

    assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
    assert!(provider.peak.load(Ordering::SeqCst) <= MAX_IN_FLIGHT);
}

#[test]
fn test_bulkhead_limit_is_clamped_to_three() {
    let bulkhead = Bulkhead::new(BulkheadConfig::default().with_max_concurrent(16));
    assert_eq!(bulkhead.limit(), MAX_IN_FLIGHT);
}

#[test]
fn test_fail_then_succeed_takes_two_attempts() {
    let provider = Arc::new(FlakyProvider::new(1, true));
    let config = ExecutorConfig::default().with_retry(RetryPolicy::new().with_backoff_ms(80));
    let executor = FetchExecutor::new(provider.clone(), config);

    let result = executor.fetch(FetchRequest::on_date(Identifier::new("2P"), Section::Comet, day()));

    assert!(result.is_success());
    assert_eq!(result.attempts, 2);
    assert_eq!(provider.calls_for("2P"), 2);

    let times = provider.call_times.lock().unwrap();
    assert!(times[1].duration_since(times[0]) >= Duration::from_millis(80));
}

#[test]
fn test_fail_twice_is_final_after_two_attempts() {
    let provider = Arc::new(FlakyProvider::new(5, false));
    let config = ExecutorConfig::default().with_retry(RetryPolicy::new().with_backoff_ms(0));
    let executor = FetchExecutor::new(provider.clone(), config);

    let result = executor.fetch(FetchRequest::on_date(Identifier::new("433;"), Section::Asteroid, day()));

    assert!(!result.is_success());
    assert_eq!(result.attempts, 2);
    assert_eq!(provider.calls_for("433;"), 2);
    assert_eq!(result.failure().unwrap().kind, FetchFailureKind::Transport);
}

#[test]
fn test_rate_limited_twice_reports_rate_limited() {
    let provider = Arc::new(FlakyProvider::new(2, true));
    let config = ExecutorConfig::default().with_retry(RetryPolicy::new().with_backoff_ms(0));
    let executor = FetchExecutor::new(provider, config);

    let result = executor.fetch(FetchRequest::on_date(Identifier::new("1;"), Section::Asteroid, day()));

    assert_eq!(result.failure().unwrap().kind, FetchFailureKind::RateLimited);
}

#[test]
fn test_one_failure_does_not_fail_the_batch() {
    let provider = Arc::new(FlakyProvider::new(2, false));
    let config = ExecutorConfig::default().with_retry(RetryPolicy::new().with_backoff_ms(0));
    let executor = FetchExecutor::new(provider, config);

    let results = executor.fetch_batch(requests(4));

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.attempts == 2));
}

#[test]
fn test_default_policy_is_single_retry_after_one_and_a_half_seconds() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 2);
    assert_eq!(policy.backoff_ms, 1_500);
}
