//! Identifier cache repopulation over the whole watchlist.

use super::duration_to_millis;
use crate::models::{
    Identifier, ObjectFailure, Provenance, ResolutionStatus, Section, WatchlistEntry,
};
use crate::resolver::IdentityResolver;
use crate::storage::atomic::write_json_atomic;
use crate::Result;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::instrument;

/// An identifier that is new or differs from the one cached before the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierChange {
    /// Watchlist section.
    pub section: Section,
    /// Display name.
    pub display_name: String,
    /// Identifier cached before the run.
    pub previous: Option<Identifier>,
    /// Identifier that validated in this run.
    pub identifier: Identifier,
    /// Stage that produced it.
    pub provenance: Provenance,
}

/// Outcome of a populate run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulateReport {
    /// Objects that had no cached identifier.
    pub new: Vec<IdentifierChange>,
    /// Objects whose cached identifier changed.
    pub changed: Vec<IdentifierChange>,
    /// Objects whose cached identifier re-validated unchanged.
    pub unchanged: usize,
    /// Objects covered by an override (never cached).
    pub skipped: Vec<String>,
    /// Objects every cascade stage failed for.
    pub failed: Vec<ObjectFailure>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

impl PopulateReport {
    /// Returns `true` if any object failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// One-line summary for terminals.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} new, {} changed, {} unchanged, {} skipped, {} failed ({}ms)",
            self.new.len(),
            self.changed.len(),
            self.unchanged,
            self.skipped.len(),
            self.failed.len(),
            self.duration_ms
        )
    }

    /// Writes the report as JSON, atomically.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self, "populate_report_write")
    }
}

/// Resolves every non-overridden watchlist object on the worker pool and
/// reports how the identifier cache changed.
#[instrument(name = "skycascade.populate", skip_all, fields(entries = entries.len()))]
pub fn populate(resolver: &IdentityResolver, entries: &[WatchlistEntry]) -> PopulateReport {
    let start = Instant::now();
    let mut report = PopulateReport::default();

    let (skipped, todo): (Vec<_>, Vec<_>) = entries
        .iter()
        .cloned()
        .partition(|e| resolver.overrides().get(e.section, &e.display_name).is_some());
    report.skipped = skipped.into_iter().map(|e| e.key().to_string()).collect();

    let previous: Vec<Option<Identifier>> = todo
        .iter()
        .map(|e| {
            resolver
                .cache()
                .get(e.section, &e.display_name)
                .map(|cached| cached.identifier)
        })
        .collect();

    let results = resolver.resolve_all(&todo);
    for (result, previous) in results.into_iter().zip(previous) {
        let (ResolutionStatus::Success, Some(identifier), Some(provenance)) =
            (result.status, result.identifier.clone(), result.provenance)
        else {
            report.failed.push(ObjectFailure {
                section: result.section,
                display_name: result.display_name.clone(),
                reason: format!("unresolved (tried: {})", result.attempted_strings().join(", ")),
            });
            continue;
        };
        if previous.as_ref() == Some(&identifier) {
            report.unchanged += 1;
            continue;
        }
        let change = IdentifierChange {
            section: result.section,
            display_name: result.display_name,
            previous: previous.clone(),
            identifier,
            provenance,
        };
        if previous.is_some() {
            report.changed.push(change);
        } else {
            report.new.push(change);
        }
    }

    report.duration_ms = duration_to_millis(start.elapsed());
    tracing::info!(summary = %report.summary(), "Populate complete");
    report
}
