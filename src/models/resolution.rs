//! Outcome of one identity resolution.

use super::{Identifier, Position, Provenance, Section};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Explicit outcome discriminant of a resolution.
///
/// Callers branch on this, never on the presence of `identifier` or
/// `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    /// A candidate validated against the primary service.
    Success,
    /// Every cascade stage was exhausted.
    Failed,
}

impl ResolutionStatus {
    /// Returns the status string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a single candidate was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum CandidateFailureReason {
    /// The identifier guard rejected the candidate; it was never sent.
    GuardRejected(String),
    /// The primary service rejected the identifier.
    Rejected(String),
    /// The primary service throttled both attempts.
    RateLimited(String),
    /// Transport or response-format failure on both attempts.
    Transport(String),
    /// The cross-reference lookup itself failed or found nothing.
    LookupFailed(String),
}

impl fmt::Display for CandidateFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GuardRejected(r) => write!(f, "guard rejected: {r}"),
            Self::Rejected(r) => write!(f, "rejected: {r}"),
            Self::RateLimited(r) => write!(f, "rate limited: {r}"),
            Self::Transport(r) => write!(f, "transport: {r}"),
            Self::LookupFailed(r) => write!(f, "lookup failed: {r}"),
        }
    }
}

/// A discarded candidate together with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFailure {
    /// Candidate identifier, or the lookup query for stage-4 lookup failures.
    pub candidate: String,
    /// Stage the candidate came from.
    pub stage: Provenance,
    /// Why it was discarded.
    pub reason: CandidateFailureReason,
}

/// A watchlist object that a batch job could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFailure {
    /// Watchlist section.
    pub section: Section,
    /// Display name.
    #[serde(alias = "name")]
    pub display_name: String,
    /// What went wrong.
    #[serde(alias = "error")]
    pub reason: String,
}

/// Result of resolving one watchlist object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Display name that was resolved.
    pub display_name: String,
    /// Watchlist section.
    pub section: Section,
    /// Explicit outcome.
    pub status: ResolutionStatus,
    /// Validated identifier (success only).
    pub identifier: Option<Identifier>,
    /// Position from the validating fetch (success only).
    pub position: Option<Position>,
    /// Stage that produced the identifier (success only).
    pub provenance: Option<Provenance>,
    /// Canonical full name reported by the cross-reference service, when the
    /// cascade consulted it.
    pub canonical_name: Option<String>,
    /// Every identifier sent for validation, in order.
    pub attempted_candidates: Vec<Identifier>,
    /// Every discarded candidate, in order.
    pub failures: Vec<CandidateFailure>,
}

impl ResolutionResult {
    /// Creates a failed result carrying the full diagnostic trail.
    #[must_use]
    pub fn failed(
        display_name: impl Into<String>,
        section: Section,
        attempted_candidates: Vec<Identifier>,
        failures: Vec<CandidateFailure>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            section,
            status: ResolutionStatus::Failed,
            identifier: None,
            position: None,
            provenance: None,
            canonical_name: None,
            attempted_candidates,
            failures,
        }
    }

    /// Creates a successful result.
    #[must_use]
    pub fn succeeded(
        display_name: impl Into<String>,
        section: Section,
        identifier: Identifier,
        position: Position,
        provenance: Provenance,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            section,
            status: ResolutionStatus::Success,
            identifier: Some(identifier),
            position: Some(position),
            provenance: Some(provenance),
            canonical_name: None,
            attempted_candidates: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Attaches the diagnostic trail gathered before the result was known.
    #[must_use]
    pub fn with_trail(
        mut self,
        attempted_candidates: Vec<Identifier>,
        failures: Vec<CandidateFailure>,
        canonical_name: Option<String>,
    ) -> Self {
        self.attempted_candidates = attempted_candidates;
        self.failures = failures;
        self.canonical_name = canonical_name;
        self
    }

    /// Returns `true` when `status` is [`ResolutionStatus::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResolutionStatus::Success
    }

    /// Returns the attempted candidates as strings.
    #[must_use]
    pub fn attempted_strings(&self) -> Vec<String> {
        self.attempted_candidates
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Converts a failed result into [`crate::Error::ResolutionExhausted`].
    pub fn into_strict(self) -> crate::Result<Self> {
        match self.status {
            ResolutionStatus::Success => Ok(self),
            ResolutionStatus::Failed => Err(crate::Error::ResolutionExhausted {
                attempted: self.attempted_strings(),
                display_name: self.display_name,
            }),
        }
    }
}
