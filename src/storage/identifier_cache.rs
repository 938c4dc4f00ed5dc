//! Persisted identifier cache (`jpl_id_cache.json`).
//!
//! One live entry per `(section, display_name)`. Writes overwrite, and every
//! read and write runs the [`IdentifierGuard`]: entries that fail it are
//! purged from memory and from disk, which forces the object back through
//! the resolution cascade.
//!
//! File layout:
//!
//! ```json
//! {
//!   "comets":    { "C/2024 G3 (ATLAS)": { "identifier": "C/2024 G3", "provenance": "heuristic", "validated_at": "..." } },
//!   "asteroids": { "433 Eros": "2000433" },
//!   "notified":  ["C/2025 A1"]
//! }
//! ```
//!
//! Bare-string entries come from older tooling and load with provenance
//! `secondary-lookup`. The `notified` list and any unknown top-level keys
//! belong to other tools and survive rewrites untouched.

use super::atomic::{read_json, write_json_atomic};
use crate::guard::{GuardVerdict, IdentifierGuard};
use crate::models::{CacheEvent, Identifier, IdentifierCacheEntry, ObjectKey, Provenance, Section};
use crate::observability::EventBus;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default file name inside the data directory.
pub const IDENTIFIER_CACHE_FILE: &str = "jpl_id_cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Full {
        identifier: Identifier,
        provenance: Provenance,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validated_at: Option<DateTime<Utc>>,
    },
    Legacy(Identifier),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    comets: BTreeMap<String, StoredEntry>,
    #[serde(default)]
    asteroids: BTreeMap<String, StoredEntry>,
    #[serde(default)]
    notified: Vec<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: BTreeMap<ObjectKey, IdentifierCacheEntry>,
    notified: Vec<String>,
    extra: BTreeMap<String, Value>,
}

impl CacheState {
    fn from_document(doc: CacheDocument) -> Self {
        let mut entries = BTreeMap::new();
        for (section, map) in [(Section::Comet, doc.comets), (Section::Asteroid, doc.asteroids)] {
            for (display_name, stored) in map {
                let (identifier, provenance, validated_at) = match stored {
                    StoredEntry::Full {
                        identifier,
                        provenance,
                        validated_at,
                    } => (identifier, provenance, validated_at),
                    StoredEntry::Legacy(identifier) => (identifier, Provenance::SecondaryLookup, None),
                };
                let key = ObjectKey::new(section, display_name.clone());
                entries.insert(
                    key,
                    IdentifierCacheEntry {
                        display_name,
                        section,
                        identifier,
                        provenance,
                        validated_at,
                    },
                );
            }
        }
        Self {
            entries,
            notified: doc.notified,
            extra: doc.extra,
        }
    }

    fn to_document(&self) -> CacheDocument {
        let mut doc = CacheDocument {
            notified: self.notified.clone(),
            extra: self.extra.clone(),
            ..CacheDocument::default()
        };
        for entry in self.entries.values() {
            let stored = StoredEntry::Full {
                identifier: entry.identifier.clone(),
                provenance: entry.provenance,
                validated_at: entry.validated_at,
            };
            let map = match entry.section {
                Section::Comet => &mut doc.comets,
                Section::Asteroid => &mut doc.asteroids,
            };
            map.insert(entry.display_name.clone(), stored);
        }
        doc
    }
}

/// Explicit identifier cache service.
pub struct IdentifierCache {
    path: Option<PathBuf>,
    guard: IdentifierGuard,
    state: Mutex<CacheState>,
    events: Option<EventBus>,
}

impl IdentifierCache {
    /// Opens the cache at `path`, purging entries the guard rejects.
    ///
    /// A missing file yields an empty cache; the file is created on the
    /// first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_events(path, None)
    }

    /// Opens the cache at `path`, publishing purge events on `events`.
    pub fn open_with_events(path: impl Into<PathBuf>, events: Option<EventBus>) -> Result<Self> {
        let path = path.into();
        let doc: CacheDocument = read_json(&path, "identifier_cache_load")?.unwrap_or_default();
        let cache = Self {
            path: Some(path),
            guard: IdentifierGuard::new(),
            state: Mutex::new(CacheState::from_document(doc)),
            events,
        };
        let purged = cache.purge_invalid()?;
        if let Some(path) = cache.path() {
            tracing::debug!(
                entries = cache.len(),
                purged,
                path = %path.display(),
                "Loaded identifier cache"
            );
        }
        Ok(cache)
    }

    /// Creates an unpersisted cache.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            guard: IdentifierGuard::new(),
            state: Mutex::new(CacheState::default()),
            events: None,
        }
    }

    /// Publishes purge events on `bus`.
    #[must_use]
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Backing file, if persisted.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &CacheState) -> Result<()> {
        match &self.path {
            Some(path) => write_json_atomic(path, &state.to_document(), "identifier_cache_write"),
            None => Ok(()),
        }
    }

    fn publish_purge(&self, entry: &IdentifierCacheEntry, reason: &str) {
        metrics::counter!("identifier_cache_purged_total").increment(1);
        tracing::warn!(
            section = %entry.section,
            display_name = %entry.display_name,
            identifier = %entry.identifier,
            reason,
            "Purged identifier cache entry"
        );
        if let Some(bus) = &self.events {
            bus.publish(CacheEvent::IdentifierPurged {
                section: entry.section,
                display_name: entry.display_name.clone(),
                identifier: entry.identifier.clone(),
                reason: reason.to_string(),
            });
        }
    }

    /// Removes every entry the guard rejects. Returns how many were removed.
    pub fn purge_invalid(&self) -> Result<usize> {
        let mut state = self.lock();
        let rejected: Vec<(ObjectKey, String)> = state
            .entries
            .iter()
            .filter_map(|(key, entry)| match self.guard.validate(&entry.identifier) {
                GuardVerdict::Accepted => None,
                GuardVerdict::Rejected { reason } => Some((key.clone(), reason)),
            })
            .collect();
        if rejected.is_empty() {
            return Ok(0);
        }
        for (key, reason) in &rejected {
            if let Some(entry) = state.entries.remove(key) {
                self.publish_purge(&entry, reason);
            }
        }
        self.persist(&state)?;
        Ok(rejected.len())
    }

    /// Returns the live entry for `(section, display_name)`.
    ///
    /// An entry that fails the guard is purged and reported as absent.
    pub fn get(&self, section: Section, display_name: &str) -> Option<IdentifierCacheEntry> {
        let key = ObjectKey::new(section, display_name);
        let mut state = self.lock();
        let entry = state.entries.get(&key)?.clone();
        match self.guard.validate(&entry.identifier) {
            GuardVerdict::Accepted => {
                metrics::counter!("identifier_cache_hits_total").increment(1);
                Some(entry)
            },
            GuardVerdict::Rejected { reason } => {
                state.entries.remove(&key);
                self.publish_purge(&entry, &reason);
                if let Err(err) = self.persist(&state) {
                    tracing::error!(error = %err, "Failed to persist identifier cache purge");
                }
                None
            },
        }
    }

    /// Writes (overwrites) an entry after running the guard.
    ///
    /// A rejected identifier is never stored; any existing entry for the same
    /// key is purged and [`Error::InvalidIdentifier`] is returned. Writing an
    /// identical entry twice leaves one stable entry.
    pub fn set(&self, entry: IdentifierCacheEntry) -> Result<()> {
        let key = ObjectKey::new(entry.section, entry.display_name.clone());
        let mut state = self.lock();

        if let GuardVerdict::Rejected { reason } = self.guard.validate(&entry.identifier) {
            if let Some(existing) = state.entries.remove(&key) {
                self.publish_purge(&existing, &reason);
                self.persist(&state)?;
            }
            return Err(Error::InvalidIdentifier {
                identifier: entry.identifier.to_string(),
                reason,
            });
        }

        if state.entries.get(&key) == Some(&entry) {
            return Ok(());
        }
        tracing::info!(
            section = %entry.section,
            display_name = %entry.display_name,
            identifier = %entry.identifier,
            provenance = %entry.provenance,
            "Cached identifier"
        );
        state.entries.insert(key, entry);
        self.persist(&state)
    }

    /// Removes an entry. Returns `true` if one existed.
    pub fn invalidate(&self, section: Section, display_name: &str) -> Result<bool> {
        let mut state = self.lock();
        let removed = state
            .entries
            .remove(&ObjectKey::new(section, display_name))
            .is_some();
        if removed {
            self.persist(&state)?;
        }
        Ok(removed)
    }

    /// Snapshot of every live entry, ordered by section then name.
    #[must_use]
    pub fn entries(&self) -> Vec<IdentifierCacheEntry> {
        self.lock().entries.values().cloned().collect()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names already reported by the notification tooling.
    #[must_use]
    pub fn notified(&self) -> Vec<String> {
        self.lock().notified.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, section: Section, id: &str, provenance: Provenance) -> IdentifierCacheEntry {
        IdentifierCacheEntry {
            display_name: name.to_string(),
            section,
            identifier: Identifier::new(id),
            provenance,
            validated_at: None,
        }
    }

    #[test]
    fn test_set_get_round_trip() {
        let cache = IdentifierCache::in_memory();
        let e = entry("433 Eros", Section::Asteroid, "433;", Provenance::Heuristic);
        cache.set(e.clone()).unwrap();
        assert_eq!(cache.get(Section::Asteroid, "433 Eros"), Some(e));
        assert_eq!(cache.get(Section::Comet, "433 Eros"), None);
    }

    #[test]
    fn test_set_is_overwrite() {
        let cache = IdentifierCache::in_memory();
        cache
            .set(entry("Juno", Section::Asteroid, "3", Provenance::Heuristic))
            .unwrap();
        cache
            .set(entry("Juno", Section::Asteroid, "3;", Provenance::SecondaryLookup))
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(Section::Asteroid, "Juno").unwrap().identifier.as_str(),
            "3;"
        );
    }

    #[test]
    fn test_rejected_write_purges_existing() {
        let cache = IdentifierCache::in_memory();
        cache
            .set(entry("433 Eros", Section::Asteroid, "433;", Provenance::Heuristic))
            .unwrap();
        let err = cache
            .set(entry("433 Eros", Section::Asteroid, "20000433", Provenance::SecondaryLookup))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_legacy_entries_and_notified_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(IDENTIFIER_CACHE_FILE);
        std::fs::write(
            &path,
            r#"{"comets":{"C/2024 G3 (ATLAS)":"1004083"},"asteroids":{},"notified":["C/2025 A1"],"schema":2}"#,
        )
        .unwrap();

        let cache = IdentifierCache::open(&path).unwrap();
        let e = cache.get(Section::Comet, "C/2024 G3 (ATLAS)").unwrap();
        assert_eq!(e.provenance, Provenance::SecondaryLookup);
        assert_eq!(cache.notified(), vec!["C/2025 A1".to_string()]);

        cache
            .set(entry("433 Eros", Section::Asteroid, "433;", Provenance::Heuristic))
            .unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["notified"][0], "C/2025 A1");
        assert_eq!(raw["schema"], 2);
        assert_eq!(raw["comets"]["C/2024 G3 (ATLAS)"]["provenance"], "secondary-lookup");
    }

    #[test]
    fn test_invalidate() {
        let cache = IdentifierCache::in_memory();
        cache
            .set(entry("29P", Section::Comet, "29P", Provenance::Heuristic))
            .unwrap();
        assert!(cache.invalidate(Section::Comet, "29P").unwrap());
        assert!(!cache.invalidate(Section::Comet, "29P").unwrap());
    }
}
