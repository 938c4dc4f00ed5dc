//! Fixed-backoff retry policy shared by interactive and batch fetches.

use crate::Result;
use std::time::{Duration, Instant};

/// Upper bound on attempts per call: the first try plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Retry behaviour for provider calls.
///
/// A failed attempt is retried once after a fixed backoff (1.5 s by
/// default); a second failure is final. `max_attempts` is clamped to
/// `1..=MAX_ATTEMPTS`, so retries can be disabled but never extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at most [`MAX_ATTEMPTS`]).
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of running a call under a [`RetryPolicy`].
#[derive(Debug)]
pub struct Attempted<T> {
    /// Result of the last attempt.
    pub result: Result<T>,
    /// Number of attempts actually made.
    pub attempts: u32,
}

impl RetryPolicy {
    /// Creates the default policy (2 attempts, 1.5 s backoff).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff_ms: 1_500,
        }
    }

    /// Loads the policy from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `SKYCASCADE_RETRY_MAX_ATTEMPTS` | Total attempts (1 or 2) | 2 |
    /// | `SKYCASCADE_RETRY_BACKOFF_MS` | Fixed backoff | 1500 |
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("SKYCASCADE_RETRY_MAX_ATTEMPTS") {
            if let Ok(parsed) = v.parse::<u32>() {
                self = self.with_max_attempts(parsed);
            }
        }
        if let Ok(v) = std::env::var("SKYCASCADE_RETRY_BACKOFF_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.backoff_ms = parsed;
            }
        }
        self
    }

    /// Sets the total attempt count, clamped to `1..=MAX_ATTEMPTS`.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = if attempts == 0 {
            1
        } else if attempts > MAX_ATTEMPTS {
            MAX_ATTEMPTS
        } else {
            attempts
        };
        self
    }

    /// Sets the backoff in milliseconds.
    #[must_use]
    pub const fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = backoff_ms;
        self
    }

    /// Backoff as a [`Duration`].
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Runs `call` until it succeeds or the attempts are used up.
    ///
    /// `call` receives the 1-based attempt number. Nothing is held while
    /// sleeping between attempts.
    pub fn run<T, F>(&self, operation: &'static str, mut call: F) -> Attempted<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let max_attempts = self.max_attempts.clamp(1, MAX_ATTEMPTS);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let started = Instant::now();
            let result = call(attempts);
            metrics::counter!(
                "provider_attempts_total",
                "operation" => operation,
                "status" => if result.is_ok() { "success" } else { "error" }
            )
            .increment(1);

            match result {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        attempts,
                    };
                },
                Err(err) if attempts < max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt = attempts,
                        max_attempts,
                        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                        backoff_ms = self.backoff_ms,
                        rate_limited = err.is_rate_limited(),
                        error = %err,
                        "Provider call failed, retrying"
                    );
                    metrics::counter!("provider_retries_total", "operation" => operation)
                        .increment(1);
                    if self.backoff_ms > 0 {
                        std::thread::sleep(self.backoff());
                    }
                },
                Err(err) => {
                    tracing::warn!(
                        operation,
                        attempts,
                        error = %err,
                        "Provider call failed after final attempt"
                    );
                    return Attempted {
                        result: Err(err),
                        attempts,
                    };
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use test_case::test_case;

    fn flaky(failures: u32) -> impl FnMut(u32) -> Result<&'static str> {
        move |attempt| {
            if attempt <= failures {
                Err(Error::RateLimited {
                    provider: "mock",
                    cause: "HTTP 503".to_string(),
                })
            } else {
                Ok("ok")
            }
        }
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.backoff_ms, 1_500);
    }

    #[test]
    fn test_success_first_try() {
        let outcome = RetryPolicy::new().with_backoff_ms(0).run("test", flaky(0));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result.unwrap(), "ok");
    }

    #[test]
    fn test_fail_then_succeed_uses_two_attempts() {
        let outcome = RetryPolicy::new().with_backoff_ms(0).run("test", flaky(1));
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.result.is_ok());
    }

    #[test]
    fn test_fail_twice_is_final() {
        let outcome = RetryPolicy::new().with_backoff_ms(0).run("test", flaky(5));
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.result.unwrap_err().is_rate_limited());
    }

    #[test]
    fn test_backoff_is_applied() {
        let started = Instant::now();
        let _ = RetryPolicy::new().with_backoff_ms(30).run("test", flaky(1));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test_case(0, 1 ; "zero becomes one")]
    #[test_case(1, 1 ; "retries disabled")]
    #[test_case(2, 2 ; "one retry")]
    #[test_case(5, 2 ; "capped at one retry")]
    fn test_max_attempts_clamped(requested: u32, expected: u32) {
        assert_eq!(RetryPolicy::new().with_max_attempts(requested).max_attempts, expected);
    }

    #[test]
    fn test_never_retries_more_than_once() {
        let widened = RetryPolicy {
            max_attempts: 5,
            backoff_ms: 0,
        };
        let outcome = widened.run("test", flaky(10));
        assert_eq!(outcome.attempts, MAX_ATTEMPTS);
        assert!(outcome.result.is_err());

        let outcome = RetryPolicy::new()
            .with_max_attempts(5)
            .with_backoff_ms(0)
            .run("test", flaky(10));
        assert_eq!(outcome.attempts, MAX_ATTEMPTS);
    }
}
