//! Identity resolution cascade.
//!
//! Turns a watchlist display name into an identifier Horizons accepts and a
//! position for the requested date. Stages run in a fixed order and stop at
//! the first candidate that validates:
//!
//! 1. admin override (sole candidate when present)
//! 2. identifier cache
//! 3. offline name heuristics ([`heuristics::candidates`])
//! 4. SBDB cross-reference ([`CrossReferenceLookup`])
//!
//! Every candidate passes the [`IdentifierGuard`] before it is sent and is
//! validated by exactly one [`FetchExecutor::fetch`] call. Identifiers that
//! validated through stages 2-4 are written back to the identifier cache.

pub mod heuristics;
mod overrides;

pub use overrides::{OVERRIDES_FILE, OverrideTable};

use crate::executor::{FetchExecutor, FetchFailureKind, FetchRequest, FetchStatus};
use crate::guard::{GuardVerdict, IdentifierGuard};
use crate::models::{
    CandidateFailure, CandidateFailureReason, Identifier, IdentifierCacheEntry, Position,
    Provenance, ResolutionResult, Section, WatchlistEntry,
};
use crate::provider::CrossReferenceLookup;
use crate::storage::IdentifierCache;
use crate::Result;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info_span, instrument};

/// Attempts and failures gathered while walking the cascade.
#[derive(Debug, Default)]
struct Trail {
    attempted: Vec<Identifier>,
    failures: Vec<CandidateFailure>,
    canonical_name: Option<String>,
}

impl Trail {
    fn was_attempted(&self, candidate: &Identifier) -> bool {
        self.attempted.contains(candidate)
    }

    fn fail(&mut self, candidate: impl Into<String>, stage: Provenance, reason: CandidateFailureReason) {
        self.failures.push(CandidateFailure {
            candidate: candidate.into(),
            stage,
            reason,
        });
    }
}

/// Runs the four-stage cascade for watchlist objects.
#[derive(Clone)]
pub struct IdentityResolver {
    executor: FetchExecutor,
    overrides: OverrideTable,
    cache: Arc<IdentifierCache>,
    lookup: Option<Arc<dyn CrossReferenceLookup>>,
    guard: IdentifierGuard,
}

impl IdentityResolver {
    /// Creates a resolver without a cross-reference stage.
    #[must_use]
    pub fn new(executor: FetchExecutor, overrides: OverrideTable, cache: Arc<IdentifierCache>) -> Self {
        Self {
            executor,
            overrides,
            cache,
            lookup: None,
            guard: IdentifierGuard::new(),
        }
    }

    /// Enables stage 4 with the given cross-reference service.
    #[must_use]
    pub fn with_lookup(mut self, lookup: Arc<dyn CrossReferenceLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// The executor used for validation.
    #[must_use]
    pub const fn executor(&self) -> &FetchExecutor {
        &self.executor
    }

    /// The identifier cache.
    #[must_use]
    pub fn cache(&self) -> &IdentifierCache {
        &self.cache
    }

    /// The override table.
    #[must_use]
    pub const fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    /// The cross-reference service, if configured.
    #[must_use]
    pub fn lookup_service(&self) -> Option<&dyn CrossReferenceLookup> {
        self.lookup.as_deref()
    }

    /// Resolves `display_name` for today's UTC date.
    #[must_use]
    pub fn resolve(&self, display_name: &str, section: Section) -> ResolutionResult {
        self.resolve_at(display_name, section, Utc::now().date_naive())
    }

    /// Resolves `display_name`, mapping exhaustion to
    /// [`crate::Error::ResolutionExhausted`].
    pub fn resolve_strict(&self, display_name: &str, section: Section) -> Result<ResolutionResult> {
        self.resolve(display_name, section).into_strict()
    }

    /// Resolves `display_name`, validating candidates against `date`.
    #[instrument(
        name = "skycascade.resolve",
        skip(self),
        fields(section = %section, provenance = tracing::field::Empty)
    )]
    pub fn resolve_at(&self, display_name: &str, section: Section, date: NaiveDate) -> ResolutionResult {
        let start = Instant::now();
        let display_name = display_name.trim();
        let mut trail = Trail::default();

        let outcome = self.run_cascade(display_name, section, date, &mut trail);

        let result = match outcome {
            Some((identifier, position, provenance)) => {
                tracing::Span::current().record("provenance", provenance.as_str());
                tracing::info!(identifier = %identifier, attempts = trail.attempted.len(), "Resolved");
                ResolutionResult::succeeded(display_name, section, identifier, position, provenance)
                    .with_trail(trail.attempted, trail.failures, trail.canonical_name)
            },
            None => {
                tracing::warn!(
                    attempted = ?trail.attempted.iter().map(Identifier::as_str).collect::<Vec<_>>(),
                    "Resolution exhausted"
                );
                let mut failed =
                    ResolutionResult::failed(display_name, section, trail.attempted, trail.failures);
                failed.canonical_name = trail.canonical_name;
                failed
            },
        };

        metrics::counter!(
            "resolutions_total",
            "section" => section.as_str(),
            "status" => result.status.as_str(),
            "provenance" => result.provenance.map_or("none", |p| p.as_str())
        )
        .increment(1);
        metrics::histogram!("resolution_duration_ms", "section" => section.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    fn run_cascade(
        &self,
        display_name: &str,
        section: Section,
        date: NaiveDate,
        trail: &mut Trail,
    ) -> Option<(Identifier, Position, Provenance)> {
        if let Some(forced) = self.overrides.get(section, display_name) {
            let _span = info_span!("skycascade.resolve.override").entered();
            return self
                .validate(forced, Provenance::Override, section, date, trail)
                .map(|position| (forced.clone(), position, Provenance::Override));
        }

        {
            let _span = info_span!("skycascade.resolve.cache").entered();
            if let Some(entry) = self.cache.get(section, display_name) {
                if let Some(position) =
                    self.validate(&entry.identifier, Provenance::Cache, section, date, trail)
                {
                    self.write_back(display_name, section, &entry.identifier, entry.provenance);
                    return Some((entry.identifier, position, Provenance::Cache));
                }
            }
        }

        {
            let _span = info_span!("skycascade.resolve.heuristics").entered();
            for candidate in heuristics::candidates(display_name, section) {
                if trail.was_attempted(&candidate) {
                    continue;
                }
                if let Some(position) =
                    self.validate(&candidate, Provenance::Heuristic, section, date, trail)
                {
                    self.write_back(display_name, section, &candidate, Provenance::Heuristic);
                    return Some((candidate, position, Provenance::Heuristic));
                }
            }
        }

        let lookup = self.lookup.as_deref()?;
        let _span = info_span!("skycascade.resolve.secondary", service = lookup.name()).entered();
        for query in heuristics::lookup_queries(display_name, section) {
            let reference = match lookup.lookup(&query) {
                Ok(Some(reference)) => reference,
                Ok(None) => {
                    trail.fail(
                        &query,
                        Provenance::SecondaryLookup,
                        CandidateFailureReason::LookupFailed("no unique match".to_string()),
                    );
                    continue;
                },
                Err(err) => {
                    trail.fail(
                        &query,
                        Provenance::SecondaryLookup,
                        CandidateFailureReason::LookupFailed(err.to_string()),
                    );
                    continue;
                },
            };
            trail
                .canonical_name
                .get_or_insert_with(|| reference.canonical_full_name.clone());

            let Some(candidate) = self.admit_lookup_identifier(&reference.internal_identifier, section, trail)
            else {
                continue;
            };
            if trail.was_attempted(&candidate) {
                continue;
            }
            if let Some(position) =
                self.validate(&candidate, Provenance::SecondaryLookup, section, date, trail)
            {
                self.write_back(display_name, section, &candidate, Provenance::SecondaryLookup);
                return Some((candidate, position, Provenance::SecondaryLookup));
            }
        }
        None
    }

    /// Guards an SBDB identifier, translating reserved-band asteroid IDs to
    /// the numbered-asteroid form.
    fn admit_lookup_identifier(
        &self,
        identifier: &Identifier,
        section: Section,
        trail: &mut Trail,
    ) -> Option<Identifier> {
        match self.guard.validate(identifier) {
            GuardVerdict::Accepted => Some(identifier.clone()),
            GuardVerdict::Rejected { reason } => {
                trail.fail(
                    identifier.as_str(),
                    Provenance::SecondaryLookup,
                    CandidateFailureReason::GuardRejected(reason),
                );
                let remapped = self.guard.remap_linked(identifier, section);
                if let Some(remapped) = &remapped {
                    tracing::info!(from = %identifier, to = %remapped, "Translated linked SBDB identifier");
                }
                remapped
            },
        }
    }

    /// Sends one candidate to the executor. Returns the validating position.
    fn validate(
        &self,
        candidate: &Identifier,
        stage: Provenance,
        section: Section,
        date: NaiveDate,
        trail: &mut Trail,
    ) -> Option<Position> {
        if let GuardVerdict::Rejected { reason } = self.guard.validate(candidate) {
            trail.fail(candidate.as_str(), stage, CandidateFailureReason::GuardRejected(reason));
            return None;
        }

        trail.attempted.push(candidate.clone());
        let result = self
            .executor
            .fetch(FetchRequest::on_date(candidate.clone(), section, date));
        match result.status {
            FetchStatus::Success { samples } => {
                let position = samples
                    .iter()
                    .find(|s| s.date == date)
                    .or_else(|| samples.first())
                    .map(crate::models::Sample::position);
                if position.is_none() {
                    trail.fail(
                        candidate.as_str(),
                        stage,
                        CandidateFailureReason::Transport("empty ephemeris".to_string()),
                    );
                }
                position
            },
            FetchStatus::Failed { failure } => {
                tracing::debug!(candidate = %candidate, stage = %stage, failure = %failure, "Candidate discarded");
                let reason = match failure.kind {
                    FetchFailureKind::RateLimited => CandidateFailureReason::RateLimited(failure.message),
                    FetchFailureKind::Rejected => CandidateFailureReason::Rejected(failure.message),
                    FetchFailureKind::Transport => CandidateFailureReason::Transport(failure.message),
                };
                trail.fail(candidate.as_str(), stage, reason);
                None
            },
        }
    }

    fn write_back(&self, display_name: &str, section: Section, identifier: &Identifier, provenance: Provenance) {
        let entry = IdentifierCacheEntry {
            display_name: display_name.to_string(),
            section,
            identifier: identifier.clone(),
            provenance,
            validated_at: Some(Utc::now()),
        };
        if let Err(err) = self.cache.set(entry) {
            tracing::warn!(error = %err, identifier = %identifier, "Identifier cache write-back failed");
        }
    }

    /// Resolves a whole watchlist on the executor's worker pool.
    ///
    /// Results are in input order.
    #[must_use]
    pub fn resolve_all(&self, entries: &[WatchlistEntry]) -> Vec<ResolutionResult> {
        let date = Utc::now().date_naive();
        let span = info_span!("skycascade.resolve_all", entries = entries.len());
        let _enter = span.enter();
        self.executor.run_pool(entries.to_vec(), |entry: WatchlistEntry| {
            self.resolve_at(&entry.display_name, entry.section, date)
        })
    }

    /// Offline preview of the first identifier stages 1-3 would try.
    #[must_use]
    pub fn planned_identifier(&self, display_name: &str, section: Section) -> Option<(Identifier, Provenance)> {
        let display_name = display_name.trim();
        if let Some(forced) = self.overrides.get(section, display_name) {
            return Some((forced.clone(), Provenance::Override));
        }
        if let Some(entry) = self.cache.get(section, display_name) {
            return Some((entry.identifier, Provenance::Cache));
        }
        heuristics::candidates(display_name, section)
            .into_iter()
            .find(|candidate| self.guard.validate(candidate).is_accepted())
            .map(|candidate| (candidate, Provenance::Heuristic))
    }

    /// Groups entries that share a planned identifier within a section.
    ///
    /// Groups follow watchlist order. Entries without a plan stand alone.
    #[must_use]
    pub fn group_by_identifier(&self, entries: Vec<WatchlistEntry>) -> Vec<PlannedGroup> {
        let mut groups: Vec<PlannedGroup> = Vec::new();
        let mut index: HashMap<(Section, Identifier), usize> = HashMap::new();
        for entry in entries {
            if let Some((identifier, _)) = self.planned_identifier(&entry.display_name, entry.section) {
                match index.entry((entry.section, identifier)) {
                    MapEntry::Occupied(slot) => {
                        tracing::info!(
                            display_name = %entry.display_name,
                            identifier = %slot.key().1,
                            "Sharing fetch with earlier watchlist entry"
                        );
                        groups[*slot.get()].duplicates.push(entry);
                        continue;
                    },
                    MapEntry::Vacant(slot) => {
                        slot.insert(groups.len());
                    },
                }
            }
            groups.push(PlannedGroup {
                primary: entry,
                duplicates: Vec::new(),
            });
        }
        groups
    }
}

/// Watchlist entries that share one planned identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedGroup {
    /// First entry in watchlist order; resolved and fetched for the group.
    pub primary: WatchlistEntry,
    /// Later entries with the same planned identifier.
    pub duplicates: Vec<WatchlistEntry>,
}

impl PlannedGroup {
    /// Every entry in the group, primary first.
    pub fn entries(&self) -> impl Iterator<Item = &WatchlistEntry> {
        std::iter::once(&self.primary).chain(&self.duplicates)
    }
}
