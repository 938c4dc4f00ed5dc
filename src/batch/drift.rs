//! Identity drift detection.
//!
//! A curated display name drifts when the cross-reference service's canonical
//! full name no longer matches it. Both sides are compared without their
//! parenthetical suffix, with whitespace collapsed and case folded, so
//! `433 Eros` matches `433 Eros (A898 PA)`. The unwrapped asteroid form
//! (`2033 (Basilea)` as `2033 Basilea`) also counts as a match.

use crate::models::{IdentityDrift, Section};
use crate::resolver::heuristics::{split_parenthetical, strip_parenthetical};

fn fold(name: &str) -> String {
    strip_parenthetical(name).to_lowercase()
}

fn unwrapped(name: &str) -> Option<String> {
    match split_parenthetical(name) {
        (base, Some(alias)) if !base.is_empty() => Some(format!("{base} {alias}").to_lowercase()),
        _ => None,
    }
}

/// Returns `true` when the stored display name still names the canonical
/// object.
#[must_use]
pub fn names_match(stored: &str, canonical: &str) -> bool {
    let canonical = fold(canonical);
    if canonical.is_empty() {
        return true;
    }
    fold(stored) == canonical || unwrapped(stored).is_some_and(|u| u == canonical)
}

/// Compares a display name with a canonical full name.
#[must_use]
pub fn detect(section: Section, stored: &str, canonical: &str) -> Option<IdentityDrift> {
    if names_match(stored, canonical) {
        return None;
    }
    tracing::warn!(section = %section, stored, canonical, "Identity drift detected");
    Some(IdentityDrift {
        section,
        stored: stored.trim().to_string(),
        canonical: canonical.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("433 Eros", "433 Eros (A898 PA)" ; "parenthetical designation")]
    #[test_case("433  eros", "433 Eros (A898 PA)" ; "case and spacing")]
    #[test_case("2033 (Basilea)", "2033 Basilea (1973 CE)" ; "unwrapped alias")]
    #[test_case("C/2024 G3 (ATLAS)", "C/2024 G3 (ATLAS)" ; "identical comet")]
    #[test_case("Arrokoth", "" ; "empty canonical")]
    fn test_no_drift(stored: &str, canonical: &str) {
        assert!(detect(Section::Asteroid, stored, canonical).is_none());
    }

    #[test]
    fn test_genuine_drift() {
        let drift = detect(Section::Asteroid, "2033 Basilea", "2033 Basel (1973 CE)").unwrap();
        assert_eq!(drift.stored, "2033 Basilea");
        assert_eq!(drift.canonical, "2033 Basel (1973 CE)");
    }
}
