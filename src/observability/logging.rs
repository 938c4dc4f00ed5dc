//! Structured logging configuration.

use serde::Deserialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter directive when none is configured.
pub const DEFAULT_FILTER: &str = "warn";

/// Filter directive used by `--verbose`.
pub const VERBOSE_FILTER: &str = "skycascade=debug,info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; unknown names fall back to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive.
    pub filter: String,
    /// Append log lines to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Loads configuration from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `SKYCASCADE_LOG` / `RUST_LOG` | Filter directive |
    /// | `SKYCASCADE_LOG_FORMAT` | `pretty` or `json` |
    /// | `SKYCASCADE_LOG_FILE` | Append-mode log file |
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(filter) = std::env::var("SKYCASCADE_LOG")
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .filter(|f| !f.trim().is_empty())
        {
            self.filter = filter;
        }
        if let Ok(v) = std::env::var("SKYCASCADE_LOG_FORMAT") {
            self.format = LogFormat::parse(&v);
        }
        if let Ok(v) = std::env::var("SKYCASCADE_LOG_FILE") {
            if !v.trim().is_empty() {
                self.file = Some(PathBuf::from(v));
            }
        }
        self
    }

    /// Raises the filter to debug for this crate when `verbose` is set and
    /// no explicit filter was configured.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        if verbose && self.filter == DEFAULT_FILTER {
            self.filter = VERBOSE_FILTER.to_string();
        }
        self
    }

    /// Builds the `EnvFilter`; an invalid directive falls back to the default.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|err| {
            tracing::warn!(filter = %self.filter, error = %err, "Invalid log filter, using default");
            EnvFilter::new(DEFAULT_FILTER)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_only_replaces_default_filter() {
        let config = LoggingConfig::default().with_verbose(true);
        assert_eq!(config.filter, VERBOSE_FILTER);

        let custom = LoggingConfig {
            filter: "skycascade=trace".to_string(),
            ..LoggingConfig::default()
        }
        .with_verbose(true);
        assert_eq!(custom.filter, "skycascade=trace");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Pretty);
    }
}
