//! Read-only watchlist files (`comets.yaml`, `asteroids.yaml`).
//!
//! Each file holds one top-level list named after its section. Items are
//! either a bare display name or a mapping with `name` and an optional
//! `alias` note; other keys belong to the admin tooling and are ignored.

use crate::models::{Section, WatchlistEntry};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Name(String),
    Number(u64),
    Detailed {
        name: String,
        #[serde(default, alias = "alias_comment")]
        alias: Option<String>,
    },
}

impl RawEntry {
    fn into_entry(self, section: Section) -> Option<WatchlistEntry> {
        let (name, alias) = match self {
            Self::Name(name) => (name, None),
            Self::Number(number) => (number.to_string(), None),
            Self::Detailed { name, alias } => (name, alias),
        };
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let entry = WatchlistEntry::new(name, section);
        Some(match alias.filter(|a| !a.trim().is_empty()) {
            Some(alias) => entry.with_alias_comment(alias.trim()),
            None => entry,
        })
    }
}

/// Parses one section's watchlist from YAML text.
pub fn parse_section(yaml: &str, section: Section) -> Result<Vec<WatchlistEntry>> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parse_err =
        |e: serde_yaml_ng::Error| Error::operation("watchlist_parse", format!("{section} watchlist: {e}"));
    let mut doc: BTreeMap<String, serde_yaml_ng::Value> =
        serde_yaml_ng::from_str::<Option<_>>(yaml)
            .map_err(parse_err)?
            .unwrap_or_default();
    let items: Vec<RawEntry> = match doc.remove(section.store_key()) {
        Some(value) => serde_yaml_ng::from_value::<Option<Vec<RawEntry>>>(value)
            .map_err(parse_err)?
            .unwrap_or_default(),
        None => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter_map(|raw| raw.into_entry(section))
        .collect())
}

/// Loads one section's watchlist file. A missing file is an empty list.
pub fn load_section(path: &Path, section: Section) -> Result<Vec<WatchlistEntry>> {
    let yaml = match std::fs::read_to_string(path) {
        Ok(yaml) => yaml,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), section = %section, "Watchlist file not found");
            return Ok(Vec::new());
        },
        Err(err) => {
            return Err(Error::operation(
                "watchlist_load",
                format!("failed to read {}: {err}", path.display()),
            ));
        },
    };
    parse_section(&yaml, section)
}

/// Loads the comet and asteroid watchlists, comets first.
pub fn load_watchlist(comets: &Path, asteroids: &Path) -> Result<Vec<WatchlistEntry>> {
    let mut entries = load_section(comets, Section::Comet)?;
    entries.extend(load_section(asteroids, Section::Asteroid)?);
    tracing::debug!(entries = entries.len(), "Loaded watchlist");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_items() {
        let yaml = "\
asteroids:
  - 433 Eros
  - name: 2033 (Basilea)
    alias: Basilea
    priority: high
  - ''
";
        let entries = parse_section(yaml, Section::Asteroid).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].display_name, "433 Eros");
        assert_eq!(entries[1].display_name, "2033 (Basilea)");
        assert_eq!(entries[1].alias_comment.as_deref(), Some("Basilea"));
    }

    #[test]
    fn test_empty_section_is_empty_list() {
        assert!(parse_section("comets:\n", Section::Comet).unwrap().is_empty());
        assert!(parse_section("version: 2\n", Section::Comet).unwrap().is_empty());
        assert!(parse_section("", Section::Comet).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = load_section(&dir.path().join("comets.yaml"), Section::Comet).unwrap();
        assert!(entries.is_empty());
    }
}
