//! End-to-end behaviour of the identity cascade against in-memory providers.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use chrono::NaiveDate;
use skycascade::executor::{ExecutorConfig, FetchExecutor, FetchRequest};
use skycascade::models::{
    CandidateFailureReason, Identifier, IdentifierCacheEntry, Provenance, Sample, Section,
};
use skycascade::provider::{CrossReference, CrossReferenceLookup, EphemerisProvider, RetryPolicy};
use skycascade::resolver::{IdentityResolver, OverrideTable};
use skycascade::storage::IdentifierCache;
use skycascade::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
}

/// Accepts a fixed set of identifiers and records everything it is sent.
struct Horizons {
    accepted: Vec<&'static str>,
    throttled: bool,
    seen: Mutex<Vec<String>>,
}

impl Horizons {
    fn accepting(accepted: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            accepted: accepted.to_vec(),
            throttled: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn throttled() -> Arc<Self> {
        Arc::new(Self {
            accepted: Vec::new(),
            throttled: true,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl EphemerisProvider for Horizons {
    fn name(&self) -> &'static str {
        "horizons-fake"
    }

    fn ephemerides(&self, request: &FetchRequest) -> Result<Vec<Sample>> {
        self.seen.lock().unwrap().push(request.identifier.to_string());
        if self.throttled {
            return Err(Error::RateLimited {
                provider: "horizons-fake",
                cause: "HTTP 429".to_string(),
            });
        }
        if self.accepted.contains(&request.identifier.as_str()) {
            return Ok(vec![Sample {
                date: request.span.start(),
                ra_deg: 200.0,
                dec_deg: -10.0,
                magnitude: Some(9.5),
            }]);
        }
        Err(Error::ObjectNotFound {
            identifier: request.identifier.to_string(),
            cause: "No matches found".to_string(),
        })
    }
}

/// Cross-reference service keyed by query string.
struct Sbdb {
    answers: HashMap<&'static str, CrossReference>,
    queries: Mutex<Vec<String>>,
}

impl Sbdb {
    fn with(answers: &[(&'static str, &str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            answers: answers
                .iter()
                .map(|(query, name, id)| {
                    (
                        *query,
                        CrossReference {
                            canonical_full_name: (*name).to_string(),
                            internal_identifier: Identifier::new(*id),
                        },
                    )
                })
                .collect(),
            queries: Mutex::new(Vec::new()),
        })
    }
}

impl CrossReferenceLookup for Sbdb {
    fn name(&self) -> &'static str {
        "sbdb-fake"
    }

    fn lookup(&self, query: &str) -> Result<Option<CrossReference>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.answers.get(query).cloned())
    }
}

fn executor(provider: Arc<Horizons>) -> FetchExecutor {
    let config = ExecutorConfig::default().with_retry(RetryPolicy::new().with_backoff_ms(0));
    FetchExecutor::new(provider, config)
}

fn resolver(provider: Arc<Horizons>, overrides: OverrideTable) -> IdentityResolver {
    IdentityResolver::new(
        executor(provider),
        overrides,
        Arc::new(IdentifierCache::in_memory()),
    )
}

fn cache_entry(name: &str, section: Section, id: &str) -> IdentifierCacheEntry {
    IdentifierCacheEntry {
        display_name: name.to_string(),
        section,
        identifier: Identifier::new(id),
        provenance: Provenance::Heuristic,
        validated_at: None,
    }
}

#[test]
fn test_override_is_the_only_candidate() {
    let provider = Horizons::accepting(&["3;"]);
    let overrides = OverrideTable::new().with_override(Section::Asteroid, "3 Juno", "3;");
    let resolver = resolver(provider.clone(), overrides);

    let result = resolver.resolve_at("3 Juno", Section::Asteroid, date());

    assert!(result.is_success());
    assert_eq!(result.provenance, Some(Provenance::Override));
    assert_eq!(result.identifier, Some(Identifier::new("3;")));
    assert_eq!(provider.seen(), ["3;"]);
}

#[test]
fn test_failed_override_does_not_fall_through() {
    let provider = Horizons::accepting(&["3;"]);
    let overrides = OverrideTable::new().with_override(Section::Asteroid, "3 Juno", "Juno");
    let resolver = resolver(provider.clone(), overrides);

    let result = resolver.resolve_at("3 Juno", Section::Asteroid, date());

    assert!(!result.is_success());
    assert_eq!(result.attempted_strings(), ["Juno"]);
    assert_eq!(provider.seen(), ["Juno", "Juno"]);
}

#[test]
fn test_stages_run_in_order() {
    let provider = Horizons::accepting(&["1003227"]);
    let sbdb = Sbdb::with(&[("C/2099 Q1", "C/2099 Q1 (Lemmon)", "1003227")]);
    let resolver = resolver(provider.clone(), OverrideTable::new()).with_lookup(sbdb.clone());
    resolver
        .cache()
        .set(cache_entry("C/2099 Q1 (Lemmon)", Section::Comet, "90001234"))
        .unwrap();

    let result = resolver.resolve_at("C/2099 Q1 (Lemmon)", Section::Comet, date());

    assert!(result.is_success());
    assert_eq!(result.provenance, Some(Provenance::SecondaryLookup));
    assert_eq!(result.attempted_strings(), ["90001234", "C/2099 Q1", "1003227"]);
    let stages: Vec<_> = result.failures.iter().map(|f| f.stage).collect();
    assert_eq!(stages, [Provenance::Cache, Provenance::Heuristic]);
    assert_eq!(result.canonical_name.as_deref(), Some("C/2099 Q1 (Lemmon)"));
    assert_eq!(sbdb.queries.lock().unwrap().as_slice(), ["C/2099 Q1"]);
}

#[test]
fn test_parenthetical_alias_tries_unwrapped_form_first() {
    let provider = Horizons::accepting(&["2033;"]);
    let resolver = resolver(provider.clone(), OverrideTable::new());

    let result = resolver.resolve_at("2033 (Basilea)", Section::Asteroid, date());

    assert!(result.is_success());
    assert_eq!(result.identifier, Some(Identifier::new("2033;")));
    assert_eq!(result.attempted_strings(), ["2033 Basilea", "2033;"]);
    let cached = resolver.cache().get(Section::Asteroid, "2033 (Basilea)").unwrap();
    assert_eq!(cached.identifier.as_str(), "2033;");
    assert_eq!(cached.provenance, Provenance::Heuristic);
}

#[test]
fn test_stale_linked_identifier_is_purged_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jpl_id_cache.json");
    std::fs::write(
        &path,
        r#"{"comets": {}, "asteroids": {"433 Eros": "20000433"}, "notified": ["C/2025 A1"]}"#,
    )
    .unwrap();

    let cache = Arc::new(IdentifierCache::open(&path).unwrap());
    assert!(cache.is_empty());
    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert!(!on_disk.contains("20000433"));
    assert!(on_disk.contains("C/2025 A1"));

    let provider = Horizons::accepting(&["433;"]);
    let resolver = IdentityResolver::new(executor(provider.clone()), OverrideTable::new(), cache);
    let result = resolver.resolve_at("433 Eros", Section::Asteroid, date());

    assert_eq!(result.provenance, Some(Provenance::Heuristic));
    assert!(!provider.seen().iter().any(|id| id == "20000433"));
}

#[test]
fn test_linked_lookup_identifier_is_translated_not_sent() {
    let provider = Horizons::accepting(&["2000433"]);
    let sbdb = Sbdb::with(&[("Eros", "433 Eros (A898 PA)", "20000433")]);
    let resolver = resolver(provider.clone(), OverrideTable::new()).with_lookup(sbdb);

    let result = resolver.resolve_at("Eros", Section::Asteroid, date());

    assert!(result.is_success());
    assert_eq!(result.identifier, Some(Identifier::new("2000433")));
    assert!(!provider.seen().iter().any(|id| id == "20000433"));
    assert!(result
        .failures
        .iter()
        .any(|f| f.candidate == "20000433"
            && matches!(f.reason, CandidateFailureReason::GuardRejected(_))));
    let cached = resolver.cache().get(Section::Asteroid, "Eros").unwrap();
    assert_eq!(cached.identifier.as_str(), "2000433");
}

#[test]
fn test_cache_validation_failure_keeps_entry() {
    let provider = Horizons::accepting(&[]);
    let resolver = resolver(provider, OverrideTable::new());
    resolver
        .cache()
        .set(cache_entry("99942 Apophis", Section::Asteroid, "2099942"))
        .unwrap();

    let result = resolver.resolve_at("99942 Apophis", Section::Asteroid, date());

    assert!(!result.is_success());
    let kept = resolver.cache().get(Section::Asteroid, "99942 Apophis").unwrap();
    assert_eq!(kept.identifier.as_str(), "2099942");
}

#[test]
fn test_throttled_candidates_report_rate_limiting() {
    let provider = Horizons::throttled();
    let resolver = resolver(provider.clone(), OverrideTable::new());

    let result = resolver.resolve_at("C/2024 G3 (ATLAS)", Section::Comet, date());

    assert!(!result.is_success());
    assert_eq!(provider.seen(), ["C/2024 G3", "C/2024 G3"]);
    assert!(matches!(
        result.failures[0].reason,
        CandidateFailureReason::RateLimited(_)
    ));
}

#[test]
fn test_strict_resolution_returns_exhausted_error() {
    let resolver = resolver(Horizons::accepting(&[]), OverrideTable::new());

    let err = resolver
        .resolve_strict("Unknown Rock", Section::Asteroid)
        .unwrap_err();

    match err {
        Error::ResolutionExhausted {
            display_name,
            attempted,
        } => {
            assert_eq!(display_name, "Unknown Rock");
            assert_eq!(attempted, ["Unknown Rock"]);
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_resolve_all_keeps_input_order() {
    let provider = Horizons::accepting(&["1;", "2;", "4;", "1P"]);
    let resolver = resolver(provider, OverrideTable::new());
    let entries = vec![
        skycascade::WatchlistEntry::new("1 Ceres", Section::Asteroid),
        skycascade::WatchlistEntry::new("2 Pallas", Section::Asteroid),
        skycascade::WatchlistEntry::new("1P/Halley", Section::Comet),
        skycascade::WatchlistEntry::new("4 Vesta", Section::Asteroid),
    ];

    let results = resolver.resolve_all(&entries);

    let names: Vec<_> = results.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(names, ["1 Ceres", "2 Pallas", "1P/Halley", "4 Vesta"]);
    assert!(results.iter().all(skycascade::ResolutionResult::is_success));
}
