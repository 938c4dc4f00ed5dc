//! Property tests for the identifier guard and the name heuristics.
//!
//! - Every identifier in the reserved band is rejected, with or without the
//!   small-body marker, and nothing outside it is
//! - The identifier cache never holds a rejected identifier
//! - Heuristic candidates are deduplicated and never empty

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use skycascade::guard::{IdentifierGuard, NUMBERED_ASTEROID_BASE, RESERVED_BAND};
use skycascade::models::{Identifier, IdentifierCacheEntry, Provenance, Section};
use skycascade::resolver::heuristics;
use skycascade::storage::IdentifierCache;

fn section() -> impl Strategy<Value = Section> {
    prop::sample::select(vec![Section::Comet, Section::Asteroid])
}

proptest! {
    /// Property: the whole reserved band is rejected.
    #[test]
    fn prop_reserved_band_rejected(id in RESERVED_BAND, marked in any::<bool>()) {
        let text = if marked { format!("{id};") } else { id.to_string() };
        prop_assert!(!IdentifierGuard::new().validate(&Identifier::new(text)).is_accepted());
    }

    /// Property: numeric identifiers outside the band are accepted.
    #[test]
    fn prop_outside_band_accepted(
        id in prop_oneof![0_u64..*RESERVED_BAND.start(), (*RESERVED_BAND.end() + 1)..u64::from(u32::MAX)]
    ) {
        prop_assert!(IdentifierGuard::new().validate(&Identifier::new(id.to_string())).is_accepted());
    }

    /// Property: linked IDs translate to the numbered-asteroid SPK-ID.
    #[test]
    fn prop_remap_linked_targets_numbered_form(number in 0_u64..1_000_000) {
        let guard = IdentifierGuard::new();
        let linked = Identifier::new((RESERVED_BAND.start() + number).to_string());
        let remapped = guard.remap_linked(&linked, Section::Asteroid).unwrap();
        prop_assert_eq!(remapped.numeric(), Some(NUMBERED_ASTEROID_BASE + number));
        prop_assert!(guard.validate(&remapped).is_accepted());
        prop_assert!(guard.remap_linked(&linked, Section::Comet).is_none());
    }

    /// Property: the cache refuses every reserved-band write.
    #[test]
    fn prop_cache_never_stores_rejected(id in RESERVED_BAND, section in section()) {
        let cache = IdentifierCache::in_memory();
        let result = cache.set(IdentifierCacheEntry {
            display_name: "Linked Body".to_string(),
            section,
            identifier: Identifier::new(id.to_string()),
            provenance: Provenance::SecondaryLookup,
            validated_at: None,
        });
        prop_assert!(result.is_err());
        prop_assert!(cache.is_empty());
    }

    /// Property: numbered asteroid names always yield the marked number.
    #[test]
    fn prop_numbered_asteroid_candidate(number in 1_u32..700_000, name in "[A-Z][a-z]{2,12}") {
        let display = format!("{number} {name}");
        let candidates = heuristics::candidates(&display, Section::Asteroid);
        prop_assert!(candidates.contains(&Identifier::small_body(&number.to_string())));
    }

    /// Property: candidates are unique and non-empty.
    #[test]
    fn prop_candidates_unique(name in "[A-Za-z0-9/ ()-]{1,40}", section in section()) {
        let candidates = heuristics::candidates(&name, section);
        for (i, candidate) in candidates.iter().enumerate() {
            prop_assert!(!candidate.core().is_empty());
            prop_assert!(!candidates[i + 1..].contains(candidate));
        }
    }
}
