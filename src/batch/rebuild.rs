//! Sequential ephemeris cache rebuild.

use super::{drift, duration_to_millis, u64_to_f64, usize_to_f64};
use crate::executor::{FetchRequest, FetchStatus};
use crate::models::{
    CacheEvent, EphemerisCacheEntry, IdentityDrift, ObjectFailure, ObjectKey, WatchlistEntry,
};
use crate::observability::EventBus;
use crate::resolver::{IdentityResolver, PlannedGroup, heuristics};
use crate::storage::EphemerisCache;
use crate::storage::atomic::write_json_atomic;
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info_span, instrument};

/// Default rebuild window.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Default delay between provider calls during a rebuild.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 500;

/// Rebuild configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildConfig {
    /// Days of samples stored per object.
    pub window_days: u32,
    /// Fixed delay between consecutive provider calls.
    pub request_delay_ms: u64,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
        }
    }
}

impl RebuildConfig {
    /// Loads configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `SKYCASCADE_REBUILD_WINDOW_DAYS` and
    /// `SKYCASCADE_REBUILD_DELAY_MS`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("SKYCASCADE_REBUILD_WINDOW_DAYS") {
            if let Ok(parsed) = v.parse::<u32>() {
                self.window_days = parsed.max(1);
            }
        }
        if let Ok(v) = std::env::var("SKYCASCADE_REBUILD_DELAY_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.request_delay_ms = parsed;
            }
        }
        self
    }

    /// Sets the window length (at least one day).
    #[must_use]
    pub const fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = if days == 0 { 1 } else { days };
        self
    }

    /// Sets the inter-request delay.
    #[must_use]
    pub const fn with_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.request_delay_ms = delay_ms;
        self
    }
}

/// Outcome of one rebuild run.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    /// When the run started.
    pub generated_utc: DateTime<Utc>,
    /// First date of every refreshed window.
    pub window_start: NaiveDate,
    /// Window length in days.
    pub window_days: u32,
    /// Objects whose samples were replaced.
    pub refreshed: Vec<ObjectKey>,
    /// Objects left untouched because resolution or fetch failed.
    pub failures: Vec<ObjectFailure>,
    /// Canonical names that diverged from display names.
    pub drift: Vec<IdentityDrift>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

impl RebuildReport {
    /// Returns `true` if any object failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// One-line summary for terminals.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Rebuilt {} object(s) for {} day(s) from {}: {} failed, {} drifted ({}ms)",
            self.refreshed.len(),
            self.window_days,
            self.window_start,
            self.failures.len(),
            self.drift.len(),
            self.duration_ms
        )
    }

    /// Writes the report as JSON, atomically.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self, "rebuild_report_write")
    }
}

/// Spaces rebuild stages (resolution, window fetch, canonical lookup) by a
/// fixed delay. Calls inside one cascade run are not paced.
struct Pacer {
    delay: Duration,
    last: Option<Instant>,
}

impl Pacer {
    const fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Rebuilds the ephemeris cache one object at a time.
pub struct EphemerisRebuilder {
    resolver: IdentityResolver,
    cache: Arc<EphemerisCache>,
    events: Option<EventBus>,
    config: RebuildConfig,
}

impl EphemerisRebuilder {
    /// Creates a rebuilder.
    #[must_use]
    pub fn new(resolver: IdentityResolver, cache: Arc<EphemerisCache>, config: RebuildConfig) -> Self {
        Self {
            resolver,
            cache,
            events: None,
            config,
        }
    }

    /// Publishes drift and rebuild events on `bus`.
    #[must_use]
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: RebuildConfig) -> Self {
        self.config = config;
        self
    }

    /// The configuration in force.
    #[must_use]
    pub const fn config(&self) -> RebuildConfig {
        self.config
    }

    /// Rebuilds every watchlist object with a window starting today (UTC).
    pub fn rebuild(&self, watchlist: &[WatchlistEntry]) -> Result<RebuildReport> {
        self.rebuild_from(watchlist, Utc::now().date_naive())
    }

    /// Rebuilds every watchlist object with a window starting at `start`.
    ///
    /// Objects run strictly in sequence. A failed object keeps its previous
    /// entry. The cache file is written once, after the last object.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cache file cannot be written.
    #[instrument(
        name = "skycascade.rebuild",
        skip(self, watchlist),
        fields(
            objects = watchlist.len(),
            window_days = self.config.window_days
        )
    )]
    pub fn rebuild_from(&self, watchlist: &[WatchlistEntry], start: NaiveDate) -> Result<RebuildReport> {
        let started = Instant::now();
        let generated_utc = Utc::now();
        let groups = self.resolver.group_by_identifier(watchlist.to_vec());
        let mut pacer = Pacer::new(Duration::from_millis(self.config.request_delay_ms));
        let mut report = RebuildReport {
            generated_utc,
            window_start: start,
            window_days: self.config.window_days,
            refreshed: Vec::new(),
            failures: Vec::new(),
            drift: Vec::new(),
            duration_ms: 0,
        };

        for group in &groups {
            let _span = info_span!(
                "skycascade.rebuild.object",
                section = %group.primary.section,
                display_name = %group.primary.display_name,
                duplicates = group.duplicates.len()
            )
            .entered();
            self.rebuild_one(group, start, &mut pacer, &mut report);
        }

        self.cache
            .record_run(generated_utc, report.drift.clone(), report.failures.clone());
        self.cache.save()?;

        report.duration_ms = duration_to_millis(started.elapsed());
        if let Some(bus) = &self.events {
            bus.publish(CacheEvent::CacheRebuilt {
                refreshed: report.refreshed.len(),
                failed: report.failures.len(),
                drifted: report.drift.len(),
            });
        }
        metrics::counter!("rebuild_runs_total").increment(1);
        metrics::gauge!("rebuild_failed_objects").set(usize_to_f64(report.failures.len()));
        metrics::histogram!("rebuild_duration_ms").record(u64_to_f64(report.duration_ms));
        tracing::info!(
            refreshed = report.refreshed.len(),
            failed = report.failures.len(),
            drifted = report.drift.len(),
            duration_ms = report.duration_ms,
            "Ephemeris cache rebuilt"
        );
        Ok(report)
    }

    fn rebuild_one(
        &self,
        group: &PlannedGroup,
        start: NaiveDate,
        pacer: &mut Pacer,
        report: &mut RebuildReport,
    ) {
        let fail = |report: &mut RebuildReport, reason: String| {
            tracing::warn!(reason = %reason, "Keeping previous ephemeris entry");
            report.failures.extend(group.entries().map(|entry| ObjectFailure {
                section: entry.section,
                display_name: entry.display_name.clone(),
                reason: reason.clone(),
            }));
        };
        let entry = &group.primary;

        pacer.wait();
        let resolution = self
            .resolver
            .resolve_at(&entry.display_name, entry.section, start);
        let Some(identifier) = resolution.identifier.clone().filter(|_| resolution.is_success()) else {
            let tried = resolution.attempted_strings().join(", ");
            fail(report, format!("unresolved (tried: {tried})"));
            return;
        };

        pacer.wait();
        let fetched = self.resolver.executor().fetch(FetchRequest::window(
            identifier,
            entry.section,
            start,
            self.config.window_days,
        ));
        match fetched.status {
            FetchStatus::Success { samples } if !samples.is_empty() => {
                for member in group.entries() {
                    let key = member.key();
                    self.cache.set(
                        key.clone(),
                        EphemerisCacheEntry::new(start, self.config.window_days, samples.clone()),
                    );
                    report.refreshed.push(key);
                }
            },
            FetchStatus::Success { .. } => fail(report, "empty ephemeris window".to_string()),
            FetchStatus::Failed { failure } => fail(report, failure.to_string()),
        }

        let canonical = match resolution.canonical_name {
            Some(name) => Some(name),
            None => self.fresh_canonical_name(entry, pacer),
        };
        let Some(canonical) = canonical else {
            return;
        };
        for member in group.entries() {
            if let Some(found) = drift::detect(member.section, &member.display_name, &canonical) {
                if let Some(bus) = &self.events {
                    bus.publish(CacheEvent::drift(found.clone()));
                }
                report.drift.push(found);
            }
        }
    }

    fn fresh_canonical_name(&self, entry: &WatchlistEntry, pacer: &mut Pacer) -> Option<String> {
        let lookup = self.resolver.lookup_service()?;
        let query = heuristics::lookup_queries(&entry.display_name, entry.section)
            .into_iter()
            .next()?;
        pacer.wait();
        match lookup.lookup(&query) {
            Ok(found) => found.map(|r| r.canonical_full_name),
            Err(err) => {
                tracing::debug!(error = %err, query, "Canonical name lookup failed");
                None
            },
        }
    }
}
