//! Time-boxed ephemeris cache (`ephemeris_cache.json`).
//!
//! Holds a window of daily samples per watchlist object, rebuilt wholesale by
//! the batch job and consulted by interactive lookups before any live call.
//! [`EphemerisCache::lookup`] never touches the network: anything outside
//! `[generated_at, generated_at + window_days)` is a [`LookupOutcome::Miss`].
//!
//! Files written by older tooling keep `generated_utc`/`horizon_days` at the
//! top level and `positions` per object; both are read transparently.

use super::atomic::{read_json, write_json_atomic};
use crate::models::{EphemerisCacheEntry, IdentityDrift, ObjectFailure, ObjectKey, Sample, Section};
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default file name inside the data directory.
pub const EPHEMERIS_CACHE_FILE: &str = "ephemeris_cache.json";

/// Why a lookup missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// No entry for the object.
    Absent,
    /// The date precedes the window.
    BeforeWindow,
    /// The date is at or past the end of the window.
    AfterWindow,
    /// In range, but the provider returned no sample for that day.
    NoSample,
}

impl MissReason {
    /// Returns the reason as a metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::BeforeWindow => "before_window",
            Self::AfterWindow => "after_window",
            Self::NoSample => "no_sample",
        }
    }
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a cache lookup. A miss is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The stored sample for the requested date.
    Hit(Sample),
    /// Fall back to the live path.
    Miss(MissReason),
}

impl LookupOutcome {
    /// Returns the sample on a hit.
    #[must_use]
    pub const fn sample(&self) -> Option<&Sample> {
        match self {
            Self::Hit(sample) => Some(sample),
            Self::Miss(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generated_at: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    window_days: Option<u32>,
    #[serde(default, alias = "positions")]
    samples: Vec<Sample>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(
        default,
        deserialize_with = "utc_timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    generated_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    horizon_days: Option<u32>,
    #[serde(default)]
    comets: BTreeMap<String, StoredObject>,
    #[serde(default)]
    asteroids: BTreeMap<String, StoredObject>,
    #[serde(default, alias = "name_changes")]
    drift: Vec<IdentityDrift>,
    #[serde(default)]
    failures: Vec<ObjectFailure>,
}

/// Reads RFC 3339 timestamps as well as the offset-less
/// `%Y-%m-%dT%H:%M:%S` form older tooling wrote, which is UTC.
mod utc_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(parsed.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    generated_utc: Option<DateTime<Utc>>,
    entries: BTreeMap<ObjectKey, EphemerisCacheEntry>,
    drift: Vec<IdentityDrift>,
    failures: Vec<ObjectFailure>,
}

impl CacheState {
    fn from_document(doc: CacheDocument) -> Self {
        let fallback_date = doc.generated_utc.map(|dt| dt.date_naive());
        let mut entries = BTreeMap::new();
        for (section, map) in [(Section::Comet, doc.comets), (Section::Asteroid, doc.asteroids)] {
            for (display_name, stored) in map {
                let (Some(generated_at), Some(window_days)) = (
                    stored.generated_at.or(fallback_date),
                    stored.window_days.or(doc.horizon_days),
                ) else {
                    tracing::warn!(
                        section = %section,
                        display_name = %display_name,
                        "Skipping ephemeris entry without window"
                    );
                    continue;
                };
                entries.insert(
                    ObjectKey::new(section, display_name),
                    EphemerisCacheEntry::new(generated_at, window_days, stored.samples),
                );
            }
        }
        Self {
            generated_utc: doc.generated_utc,
            entries,
            drift: doc.drift,
            failures: doc.failures,
        }
    }

    fn to_document(&self) -> CacheDocument {
        let mut doc = CacheDocument {
            generated_utc: self.generated_utc,
            drift: self.drift.clone(),
            failures: self.failures.clone(),
            ..CacheDocument::default()
        };
        for (key, entry) in &self.entries {
            let map = match key.section {
                Section::Comet => &mut doc.comets,
                Section::Asteroid => &mut doc.asteroids,
            };
            map.insert(
                key.display_name.clone(),
                StoredObject {
                    generated_at: Some(entry.generated_at),
                    window_days: Some(entry.window_days),
                    samples: entry.samples.clone(),
                },
            );
        }
        doc
    }
}

/// Explicit ephemeris cache service.
///
/// Mutations stay in memory until [`EphemerisCache::save`], which replaces
/// the file atomically.
pub struct EphemerisCache {
    path: Option<PathBuf>,
    state: Mutex<CacheState>,
}

impl EphemerisCache {
    /// Opens the cache at `path`; a missing file yields an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc: CacheDocument = read_json(&path, "ephemeris_cache_load")?.unwrap_or_default();
        let state = CacheState::from_document(doc);
        tracing::debug!(
            path = %path.display(),
            objects = state.entries.len(),
            "Loaded ephemeris cache"
        );
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Creates an unpersisted cache.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Backing file, if persisted.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up the sample for `date`. Never makes a network call.
    pub fn lookup(&self, key: &ObjectKey, date: NaiveDate) -> LookupOutcome {
        let outcome = {
            let state = self.lock();
            match state.entries.get(key) {
                None => LookupOutcome::Miss(MissReason::Absent),
                Some(entry) if date < entry.generated_at => {
                    LookupOutcome::Miss(MissReason::BeforeWindow)
                },
                Some(entry) if date >= entry.window_end() => {
                    LookupOutcome::Miss(MissReason::AfterWindow)
                },
                Some(entry) => entry
                    .samples
                    .iter()
                    .find(|s| s.date == date)
                    .cloned()
                    .map_or(LookupOutcome::Miss(MissReason::NoSample), LookupOutcome::Hit),
            }
        };
        match &outcome {
            LookupOutcome::Hit(_) => {
                metrics::counter!("ephemeris_cache_lookups_total", "outcome" => "hit").increment(1);
            },
            LookupOutcome::Miss(reason) => {
                metrics::counter!(
                    "ephemeris_cache_lookups_total",
                    "outcome" => "miss",
                    "reason" => reason.as_str()
                )
                .increment(1);
                tracing::debug!(key = %key, %date, reason = %reason, "Ephemeris cache miss");
            },
        }
        outcome
    }

    /// Returns a copy of the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &ObjectKey) -> Option<EphemerisCacheEntry> {
        self.lock().entries.get(key).cloned()
    }

    /// Replaces the entry for `key` wholesale.
    pub fn set(&self, key: ObjectKey, entry: EphemerisCacheEntry) {
        self.lock().entries.insert(key, entry);
    }

    /// Removes the entry for `key`. Returns `true` if one existed.
    pub fn invalidate(&self, key: &ObjectKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Records the outcome of a rebuild run.
    pub fn record_run(
        &self,
        generated_utc: DateTime<Utc>,
        drift: Vec<IdentityDrift>,
        failures: Vec<ObjectFailure>,
    ) {
        let mut state = self.lock();
        state.generated_utc = Some(generated_utc);
        state.drift = drift;
        state.failures = failures;
    }

    /// When the last rebuild ran.
    #[must_use]
    pub fn generated_utc(&self) -> Option<DateTime<Utc>> {
        self.lock().generated_utc
    }

    /// Drift observed by the last rebuild.
    #[must_use]
    pub fn drift(&self) -> Vec<IdentityDrift> {
        self.lock().drift.clone()
    }

    /// Failures of the last rebuild.
    #[must_use]
    pub fn failures(&self) -> Vec<ObjectFailure> {
        self.lock().failures.clone()
    }

    /// Keys of all cached objects.
    #[must_use]
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.lock().entries.keys().cloned().collect()
    }

    /// Number of cached objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the whole cache atomically.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let state = self.lock();
        write_json_atomic(path, &state.to_document(), "ephemeris_cache_write")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn sample(d: u32) -> Sample {
        Sample {
            date: date(d),
            ra_deg: f64::from(d),
            dec_deg: -f64::from(d),
            magnitude: None,
        }
    }

    #[test]
    fn test_lookup_reasons() {
        let cache = EphemerisCache::in_memory();
        let key = ObjectKey::new(Section::Comet, "29P/Schwassmann-Wachmann");
        assert_eq!(cache.lookup(&key, date(1)), LookupOutcome::Miss(MissReason::Absent));

        cache.set(
            key.clone(),
            EphemerisCacheEntry::new(date(2), 3, vec![sample(2), sample(4)]),
        );
        assert_eq!(cache.lookup(&key, date(2)), LookupOutcome::Hit(sample(2)));
        assert_eq!(cache.lookup(&key, date(1)), LookupOutcome::Miss(MissReason::BeforeWindow));
        assert_eq!(cache.lookup(&key, date(3)), LookupOutcome::Miss(MissReason::NoSample));
        assert_eq!(cache.lookup(&key, date(5)), LookupOutcome::Miss(MissReason::AfterWindow));
    }

    #[test]
    fn test_reads_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EPHEMERIS_CACHE_FILE);
        std::fs::write(
            &path,
            r#"{
              "generated_utc": "2026-03-01T06:00:00Z",
              "horizon_days": 30,
              "comets": {"C/2024 G3 (ATLAS)": {"positions": [{"date": "2026-03-02", "ra": 1.5, "dec": -2.5}]}},
              "asteroids": {},
              "name_changes": [],
              "failures": []
            }"#,
        )
        .unwrap();

        let cache = EphemerisCache::open(&path).unwrap();
        let key = ObjectKey::new(Section::Comet, "C/2024 G3 (ATLAS)");
        let entry = cache.get(&key).unwrap();
        assert_eq!(entry.generated_at, date(1));
        assert_eq!(entry.window_days, 30);
        assert!(cache.lookup(&key, date(2)).sample().is_some());
    }

    #[test]
    fn test_reads_offsetless_timestamp_and_legacy_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EPHEMERIS_CACHE_FILE);
        std::fs::write(
            &path,
            r#"{
              "generated_utc": "2026-03-01T06:00:00",
              "horizon_days": 30,
              "comets": {},
              "asteroids": {"433 Eros": {"positions": [{"date": "2026-03-05", "ra": 10.0, "dec": 5.0}]}},
              "name_changes": [{"section": "asteroids", "stored": "2033 Basilea", "canonical": "2033 Basel (1973 CE)"}],
              "failures": [{"section": "comets", "name": "C/2099 Z9", "error": "No matches found"}]
            }"#,
        )
        .unwrap();

        let cache = EphemerisCache::open(&path).unwrap();
        let key = ObjectKey::new(Section::Asteroid, "433 Eros");
        assert_eq!(cache.get(&key).unwrap().generated_at, date(1));
        assert!(cache.lookup(&key, date(5)).sample().is_some());
        assert_eq!(cache.drift().len(), 1);

        let failures = cache.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].section, Section::Comet);
        assert_eq!(failures[0].display_name, "C/2099 Z9");
        assert_eq!(failures[0].reason, "No matches found");
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EPHEMERIS_CACHE_FILE);
        let cache = EphemerisCache::open(&path).unwrap();
        let key = ObjectKey::new(Section::Asteroid, "433 Eros");
        cache.set(key.clone(), EphemerisCacheEntry::new(date(1), 30, vec![sample(7)]));
        cache.save().unwrap();

        let reopened = EphemerisCache::open(&path).unwrap();
        assert_eq!(reopened.lookup(&key, date(7)), LookupOutcome::Hit(sample(7)));
        assert!(reopened.invalidate(&key));
        assert!(reopened.is_empty());
    }
}
