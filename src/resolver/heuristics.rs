//! Offline name heuristics (cascade stage 3).
//!
//! Derives Horizons identifier candidates from a display name without any
//! network access. Asteroid rules:
//!
//! | Display name | Candidates |
//! |--------------|------------|
//! | `2033 (Basilea)` | `2033 Basilea`, `2033;` |
//! | `433 Eros` | `433;` |
//! | `433` | `433;` |
//! | `2001 FD58` | `2001 FD58` |
//! | `Ceres` | `1;` |
//! | `Arrokoth` | `Arrokoth` |
//!
//! A bare catalog number collides with major-body IDs (`3` is a spacecraft,
//! `499` is Mars), so numbers always carry the small-body marker.
//!
//! Comets drop the parenthetical discoverer suffix and periodic comets also
//! contribute their short designation (`29P/Schwassmann-Wachmann` → `29P`).

use crate::models::{Identifier, Section};
use regex::Regex;
use std::sync::LazyLock;

/// `2001 FD58`, `2024 YR4`: year + half-month letters + digit.
static PROVISIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}\s+[A-Z]{1,2}\d").unwrap_or_else(|_| unreachable!())
});

/// Leading catalog number followed by a name or nothing.
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\s|$)").unwrap_or_else(|_| unreachable!()));

/// `29P/...`, `73P-B/...`, `12P`: periodic or defunct comet short form.
static PERIODIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+[PD](?:-[A-Z]{1,2})?)(?:/|$)").unwrap_or_else(|_| unreachable!())
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap_or_else(|_| unreachable!()));

/// Well-known bare names that are ambiguous in Horizons (spacecraft, major
/// bodies, satellites) mapped to their catalog numbers.
const BARE_NAME_ALIASES: &[(&str, u32)] = &[
    ("ceres", 1),
    ("pallas", 2),
    ("juno", 3),
    ("vesta", 4),
    ("astraea", 5),
    ("hebe", 6),
    ("iris", 7),
    ("flora", 8),
    ("metis", 9),
    ("hygiea", 10),
    ("psyche", 16),
    ("eros", 433),
    ("itokawa", 25143),
    ("apophis", 99942),
    ("bennu", 101_955),
    ("ryugu", 162_173),
];

/// Collapses internal whitespace and trims.
#[must_use]
pub fn normalize_whitespace(name: &str) -> String {
    WHITESPACE.replace_all(name.trim(), " ").into_owned()
}

/// Splits `"base (alias)"` into `("base", Some("alias"))`.
///
/// Only a parenthetical at the end of the name counts; everything from the
/// first `(` onward is treated as the suffix.
#[must_use]
pub fn split_parenthetical(name: &str) -> (String, Option<String>) {
    let name = normalize_whitespace(name);
    match name.find('(') {
        Some(open) => {
            let base = name[..open].trim().to_string();
            let alias = name[open + 1..]
                .trim_end()
                .trim_end_matches(')')
                .trim()
                .to_string();
            (base, (!alias.is_empty()).then_some(alias))
        },
        None => (name, None),
    }
}

/// Returns the name without any parenthetical suffix, whitespace collapsed.
#[must_use]
pub fn strip_parenthetical(name: &str) -> String {
    split_parenthetical(name).0
}

/// Looks up a bare name in the alias table (case-insensitive).
#[must_use]
pub fn bare_name_alias(name: &str) -> Option<Identifier> {
    let lowered = name.trim().to_lowercase();
    BARE_NAME_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, number)| Identifier::small_body(&number.to_string()))
}

/// Ordered, deduplicated heuristic candidates for a display name.
#[must_use]
pub fn candidates(display_name: &str, section: Section) -> Vec<Identifier> {
    let raw = match section {
        Section::Asteroid => asteroid_candidates(display_name),
        Section::Comet => comet_candidates(display_name),
    };
    let mut out: Vec<Identifier> = Vec::with_capacity(raw.len());
    for candidate in raw {
        if !candidate.core().is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

fn asteroid_candidates(display_name: &str) -> Vec<Identifier> {
    let (base, alias) = split_parenthetical(display_name);
    let mut out = Vec::new();

    if let Some(alias) = &alias {
        let unwrapped = if base.is_empty() {
            alias.clone()
        } else {
            format!("{base} {alias}")
        };
        out.push(Identifier::new(unwrapped));
    }

    let core = if base.is_empty() {
        alias.unwrap_or_default()
    } else {
        base
    };
    if PROVISIONAL.is_match(&core) {
        out.push(Identifier::new(core));
    } else if let Some(caps) = NUMBERED.captures(&core) {
        out.push(Identifier::small_body(&caps[1]));
    } else if !core.chars().any(|c| c.is_ascii_digit()) {
        out.push(bare_name_alias(&core).unwrap_or_else(|| Identifier::new(core)));
    } else {
        out.push(Identifier::new(core));
    }
    out
}

fn comet_candidates(display_name: &str) -> Vec<Identifier> {
    let (base, alias) = split_parenthetical(display_name);
    let base = if base.is_empty() {
        alias.unwrap_or_default()
    } else {
        base
    };
    let mut out = vec![Identifier::new(base.clone())];
    if let Some(caps) = PERIODIC.captures(&base) {
        out.push(Identifier::new(&caps[1]));
    }
    out
}

/// Queries for the cross-reference service: short form first, then the full
/// display name.
#[must_use]
pub fn lookup_queries(display_name: &str, section: Section) -> Vec<String> {
    let full = normalize_whitespace(display_name);
    let (base, _) = split_parenthetical(&full);
    let short = match section {
        Section::Asteroid if !PROVISIONAL.is_match(&base) => NUMBERED
            .captures(&base)
            .map_or_else(|| base.clone(), |caps| caps[1].to_string()),
        Section::Comet => PERIODIC
            .captures(&base)
            .map_or_else(|| base.clone(), |caps| caps[1].to_string()),
        Section::Asteroid => base,
    };
    let mut queries = Vec::with_capacity(2);
    for query in [short, full] {
        if !query.is_empty() && !queries.contains(&query) {
            queries.push(query);
        }
    }
    queries
}
