//! Whole-watchlist workflow through the service container: identifier cache
//! population, diagnosis, ephemeris rebuild and cache-first positions.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Days, Utc};
use skycascade::batch::{self, RebuildConfig};
use skycascade::config::SkycascadeConfig;
use skycascade::executor::{ExecutorConfig, FetchRequest};
use skycascade::models::{Identifier, Sample, Section};
use skycascade::provider::{EphemerisProvider, RetryPolicy};
use skycascade::services::{PositionSource, ServiceContainer};
use skycascade::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Accepts a fixed set of identifiers and answers with one sample per day.
struct Horizons {
    accepted: Vec<&'static str>,
    calls: AtomicUsize,
}

impl Horizons {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            accepted: vec!["29P", "C/2024 G3", "433;", "3;"],
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EphemerisProvider for Horizons {
    fn name(&self) -> &'static str {
        "horizons-fake"
    }

    fn ephemerides(&self, request: &FetchRequest) -> Result<Vec<Sample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.accepted.contains(&request.identifier.as_str()) {
            return Err(Error::ObjectNotFound {
                identifier: request.identifier.to_string(),
                cause: "No matches found".to_string(),
            });
        }
        let first = request.span.start();
        Ok((0..request.span.days())
            .map(|d| Sample {
                date: first.checked_add_days(Days::new(u64::from(d))).unwrap(),
                ra_deg: 45.0 + f64::from(d),
                dec_deg: 15.0,
                magnitude: Some(10.0),
            })
            .collect())
    }
}

fn write_data_dir(dir: &Path) {
    std::fs::write(
        dir.join("comets.yaml"),
        "comets:\n  - 29P/Schwassmann-Wachmann\n  - name: C/2024 G3 (ATLAS)\n    alias: great comet candidate\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("asteroids.yaml"),
        "asteroids:\n  - 433 Eros\n  - 3 Juno\n  - 2033 (Basilea)\n",
    )
    .unwrap();
    std::fs::write(dir.join("jpl_id_overrides.yaml"), "asteroids:\n  3 Juno: \"3;\"\n").unwrap();
}

fn container(dir: &Path) -> ServiceContainer {
    container_with(dir, Horizons::new())
}

fn container_with(dir: &Path, provider: Arc<Horizons>) -> ServiceContainer {
    let mut config = SkycascadeConfig::new().with_data_dir(dir);
    config.executor = ExecutorConfig::default().with_retry(RetryPolicy::new().with_backoff_ms(0));
    config.rebuild = RebuildConfig::default()
        .with_window_days(10)
        .with_request_delay_ms(0);
    ServiceContainer::with_providers(&config, provider, None).unwrap()
}

#[test]
fn test_populate_reports_new_then_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    write_data_dir(dir.path());
    let services = container(dir.path());
    let watchlist = services.watchlist().unwrap();
    assert_eq!(watchlist.len(), 5);

    let first = batch::populate(services.resolver(), &watchlist);
    assert_eq!(first.skipped, ["asteroid:3 Juno"]);
    let new: Vec<_> = first.new.iter().map(|c| c.display_name.as_str()).collect();
    assert_eq!(new, ["29P/Schwassmann-Wachmann", "C/2024 G3 (ATLAS)", "433 Eros"]);
    assert_eq!(first.failed.len(), 1);
    assert_eq!(first.failed[0].display_name, "2033 (Basilea)");

    let on_disk = std::fs::read_to_string(dir.path().join("jpl_id_cache.json")).unwrap();
    assert!(on_disk.contains("\"433;\""));
    assert!(on_disk.contains("\"29P\""));

    let second = batch::populate(services.resolver(), &watchlist);
    assert!(second.new.is_empty());
    assert!(second.changed.is_empty());
    assert_eq!(second.unchanged, 3);
}

#[test]
fn test_populate_reports_changed_identifier() {
    let dir = tempfile::tempdir().unwrap();
    write_data_dir(dir.path());
    std::fs::write(
        dir.path().join("jpl_id_cache.json"),
        r#"{"comets": {}, "asteroids": {"433 Eros": "2000433"}}"#,
    )
    .unwrap();
    let services = container(dir.path());
    let watchlist = services.watchlist().unwrap();

    let report = batch::populate(services.resolver(), &watchlist);

    assert_eq!(report.changed.len(), 1);
    let change = &report.changed[0];
    assert_eq!(change.display_name, "433 Eros");
    assert_eq!(change.previous, Some(Identifier::new("2000433")));
    assert_eq!(change.identifier, Identifier::new("433;"));
}

#[test]
fn test_diagnose_table_footer() {
    let dir = tempfile::tempdir().unwrap();
    write_data_dir(dir.path());
    let services = container(dir.path());
    let watchlist = services.watchlist().unwrap();

    let rows = batch::diagnose(services.resolver(), &watchlist);
    let table = batch::render_table(&rows);

    assert_eq!(rows.len(), 5);
    assert!(table.starts_with("SECTION"));
    assert!(table.contains("override"));
    assert!(table.trim_end().ends_with("5 object(s), 1 failed"));
}

#[test]
fn test_locate_prefers_rebuilt_cache() {
    let dir = tempfile::tempdir().unwrap();
    write_data_dir(dir.path());
    let provider = Horizons::new();
    let services = container_with(dir.path(), Arc::clone(&provider));
    let today = Utc::now().date_naive();

    let live = services
        .positions()
        .locate("433 Eros", Section::Asteroid, today)
        .unwrap();
    assert_eq!(live.source, PositionSource::Live);
    assert_eq!(live.cache_miss.as_deref(), Some("absent"));

    let report = services.rebuilder().rebuild(&services.watchlist().unwrap()).unwrap();
    assert_eq!(report.refreshed.len(), 4);
    assert_eq!(report.failures.len(), 1);

    let calls_before = provider.calls();
    let cached = services
        .positions()
        .locate("433 Eros", Section::Asteroid, today)
        .unwrap();
    assert_eq!(cached.source, PositionSource::Cache);
    assert_eq!(provider.calls(), calls_before);
    assert!(cached.cache_miss.is_none());

    let reopened = container(dir.path());
    assert_eq!(reopened.ephemeris_cache().len(), 4);
}

#[test]
fn test_locate_unknown_object_is_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    write_data_dir(dir.path());
    let services = container(dir.path());

    let err = services
        .positions()
        .locate("2033 (Basilea)", Section::Asteroid, Utc::now().date_naive())
        .unwrap_err();

    assert!(matches!(err, Error::ResolutionExhausted { .. }));
}
