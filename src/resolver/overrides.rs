//! Admin override table (`jpl_id_overrides.yaml`).

use crate::models::{Identifier, Section};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Default override file name.
pub const OVERRIDES_FILE: &str = "jpl_id_overrides.yaml";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Text(String),
    Number(u64),
}

impl From<RawIdentifier> for Identifier {
    fn from(raw: RawIdentifier) -> Self {
        match raw {
            RawIdentifier::Text(text) => Self::new(text),
            RawIdentifier::Number(number) => Self::new(number.to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct OverrideDocument {
    #[serde(default)]
    comets: Option<BTreeMap<String, RawIdentifier>>,
    #[serde(default)]
    asteroids: Option<BTreeMap<String, RawIdentifier>>,
}

/// Forced identifiers keyed by exact display name, per section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTable {
    comets: BTreeMap<String, Identifier>,
    asteroids: BTreeMap<String, Identifier>,
}

impl OverrideTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the YAML document.
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        let doc: OverrideDocument = serde_yaml_ng::from_str::<Option<OverrideDocument>>(yaml)
            .map_err(|e| Error::operation("overrides_parse", e))?
            .unwrap_or_default();
        let convert = |map: Option<BTreeMap<String, RawIdentifier>>| {
            map.unwrap_or_default()
                .into_iter()
                .map(|(name, id)| (name.trim().to_string(), Identifier::from(id)))
                .filter(|(name, id)| !name.is_empty() && !id.as_str().is_empty())
                .collect::<BTreeMap<_, _>>()
        };
        Ok(Self {
            comets: convert(doc.comets),
            asteroids: convert(doc.asteroids),
        })
    }

    /// Loads the table from disk. A missing file is an empty table.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(yaml) => {
                let table = Self::parse(&yaml)?;
                tracing::debug!(path = %path.display(), overrides = table.len(), "Loaded overrides");
                Ok(table)
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(err) => Err(Error::operation(
                "overrides_load",
                format!("failed to read {}: {err}", path.display()),
            )),
        }
    }

    /// Adds or replaces an override.
    #[must_use]
    pub fn with_override(
        mut self,
        section: Section,
        display_name: impl Into<String>,
        identifier: impl Into<Identifier>,
    ) -> Self {
        self.section_mut(section)
            .insert(display_name.into(), identifier.into());
        self
    }

    /// Returns the forced identifier for an exact display name.
    #[must_use]
    pub fn get(&self, section: Section, display_name: &str) -> Option<&Identifier> {
        self.section(section).get(display_name.trim())
    }

    /// Total overrides across both sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.comets.len() + self.asteroids.len()
    }

    /// Returns `true` when no override is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    const fn section(&self, section: Section) -> &BTreeMap<String, Identifier> {
        match section {
            Section::Comet => &self.comets,
            Section::Asteroid => &self.asteroids,
        }
    }

    const fn section_mut(&mut self, section: Section) -> &mut BTreeMap<String, Identifier> {
        match section {
            Section::Comet => &mut self.comets,
            Section::Asteroid => &mut self.asteroids,
        }
    }
}
