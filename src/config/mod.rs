//! Configuration management.
//!
//! Defaults, then a TOML file (`--config`, `SKYCASCADE_CONFIG_PATH`, or the
//! platform config dir), then `SKYCASCADE_*` environment overrides.

use crate::batch::RebuildConfig;
use crate::executor::ExecutorConfig;
use crate::observability::{LogFormat, LoggingConfig};
use crate::provider::{HorizonsConfig, SbdbConfig};
use crate::resolver::OVERRIDES_FILE;
use crate::storage::{EPHEMERIS_CACHE_FILE, IDENTIFIER_CACHE_FILE};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SKYCASCADE_CONFIG_PATH";

/// File locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsConfig {
    /// Directory holding the watchlists, overrides and caches.
    pub data_dir: PathBuf,
    /// Comet watchlist (`comets.yaml`).
    pub comets: PathBuf,
    /// Asteroid watchlist (`asteroids.yaml`).
    pub asteroids: PathBuf,
    /// Override table.
    pub overrides: PathBuf,
    /// Identifier cache.
    pub identifier_cache: PathBuf,
    /// Ephemeris cache.
    pub ephemeris_cache: PathBuf,
}

impl PathsConfig {
    /// Lays out every file under `data_dir` with the default names.
    #[must_use]
    pub fn under(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            comets: data_dir.join("comets.yaml"),
            asteroids: data_dir.join("asteroids.yaml"),
            overrides: data_dir.join(OVERRIDES_FILE),
            identifier_cache: data_dir.join(IDENTIFIER_CACHE_FILE),
            ephemeris_cache: data_dir.join(EPHEMERIS_CACHE_FILE),
            data_dir,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::under("data")
    }
}

/// Main configuration for skycascade.
#[derive(Debug, Clone)]
pub struct SkycascadeConfig {
    /// File locations.
    pub paths: PathsConfig,
    /// Primary ephemeris service.
    pub horizons: HorizonsConfig,
    /// Cross-reference service.
    pub sbdb: SbdbConfig,
    /// Whether the cascade may consult the cross-reference service.
    pub sbdb_enabled: bool,
    /// Worker pool, bulkhead and retry policy.
    pub executor: ExecutorConfig,
    /// Ephemeris cache rebuild.
    pub rebuild: RebuildConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Paths section.
    pub paths: Option<ConfigFilePaths>,
    /// Horizons section.
    pub horizons: Option<ConfigFileHorizons>,
    /// SBDB section.
    pub sbdb: Option<ConfigFileSbdb>,
    /// Executor section.
    pub executor: Option<ConfigFileExecutor>,
    /// Rebuild section.
    pub rebuild: Option<ConfigFileRebuild>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Paths section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFilePaths {
    /// Data directory; other paths default to files inside it.
    pub data_dir: Option<String>,
    /// Comet watchlist.
    pub comets: Option<String>,
    /// Asteroid watchlist.
    pub asteroids: Option<String>,
    /// Override table.
    pub overrides: Option<String>,
    /// Identifier cache.
    pub identifier_cache: Option<String>,
    /// Ephemeris cache.
    pub ephemeris_cache: Option<String>,
}

/// Horizons section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileHorizons {
    /// API endpoint.
    pub endpoint: Option<String>,
    /// Observer center code.
    pub center: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// SBDB section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSbdb {
    /// Whether stage 4 and drift lookups run.
    pub enabled: Option<bool>,
    /// API endpoint.
    pub endpoint: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
}

/// Executor section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileExecutor {
    /// Worker pool size (capped at 3).
    pub workers: Option<usize>,
    /// Max in-flight provider calls (capped at 3).
    pub max_concurrent: Option<usize>,
    /// Bulkhead permit timeout.
    pub acquire_timeout_ms: Option<u64>,
    /// Attempts per request, first included (1 or 2).
    pub retry_max_attempts: Option<u32>,
    /// Fixed backoff between attempts.
    pub retry_backoff_ms: Option<u64>,
}

/// Rebuild section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRebuild {
    /// Window length.
    pub window_days: Option<u32>,
    /// Delay between provider calls.
    pub request_delay_ms: Option<u64>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
    /// Append-mode log file.
    pub file: Option<String>,
}

impl Default for SkycascadeConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            horizons: HorizonsConfig::default(),
            sbdb: SbdbConfig::default(),
            sbdb_enabled: true,
            executor: ExecutorConfig::default(),
            rebuild: RebuildConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SkycascadeConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_config_file", format!("{}: {e}", path.display())))?;
        Self::parse(&contents)
    }

    /// Parses a TOML document over the defaults.
    pub fn parse(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))?;
        Ok(Self::from_config_file(file))
    }

    /// Resolves the configuration for a process.
    ///
    /// Uses `explicit`, then `SKYCASCADE_CONFIG_PATH`, then the default
    /// locations, and applies environment overrides last.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be loaded.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let named = explicit.map(Path::to_path_buf).or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        });
        let config = match named {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/skycascade/` on macOS)
    /// 2. XDG config dir (`~/.config/skycascade/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::new();
        };

        let candidates = [
            base_dirs.config_dir().join("skycascade").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("skycascade")
                .join("config.toml"),
        ];
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Ignoring unreadable config file");
                },
            }
        }

        Self::new()
    }

    /// Applies `SKYCASCADE_*` environment overrides to every section.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("SKYCASCADE_DATA_DIR") {
            if !v.trim().is_empty() {
                self.paths = PathsConfig::under(v);
            }
        }
        if let Ok(v) = std::env::var("SKYCASCADE_SBDB_ENABLED") {
            self.sbdb_enabled = !(v.eq_ignore_ascii_case("false") || v == "0");
        }
        self.horizons = self.horizons.with_env_overrides();
        self.sbdb = self.sbdb.with_env_overrides();
        self.executor = self.executor.with_env_overrides();
        self.rebuild = self.rebuild.with_env_overrides();
        self.logging = self.logging.with_env_overrides();
        self
    }

    /// Sets the data directory and every default file location inside it.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths = PathsConfig::under(path);
        self
    }

    /// Converts a `ConfigFile` to `SkycascadeConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::new();

        if let Some(paths) = file.paths {
            if let Some(data_dir) = paths.data_dir {
                config.paths = PathsConfig::under(data_dir);
            }
            let set = |target: &mut PathBuf, value: Option<String>| {
                if let Some(value) = value {
                    *target = PathBuf::from(value);
                }
            };
            set(&mut config.paths.comets, paths.comets);
            set(&mut config.paths.asteroids, paths.asteroids);
            set(&mut config.paths.overrides, paths.overrides);
            set(&mut config.paths.identifier_cache, paths.identifier_cache);
            set(&mut config.paths.ephemeris_cache, paths.ephemeris_cache);
        }
        if let Some(horizons) = file.horizons {
            if let Some(v) = horizons.endpoint {
                config.horizons.endpoint = v;
            }
            if let Some(v) = horizons.center {
                config.horizons.center = v;
            }
            if let Some(v) = horizons.timeout_ms {
                config.horizons.http.timeout_ms = v;
            }
            if let Some(v) = horizons.connect_timeout_ms {
                config.horizons.http.connect_timeout_ms = v;
            }
        }
        if let Some(sbdb) = file.sbdb {
            if let Some(v) = sbdb.enabled {
                config.sbdb_enabled = v;
            }
            if let Some(v) = sbdb.endpoint {
                config.sbdb.endpoint = v;
            }
            if let Some(v) = sbdb.timeout_ms {
                config.sbdb.http.timeout_ms = v;
            }
        }
        if let Some(executor) = file.executor {
            if let Some(v) = executor.workers {
                config.executor.workers = v;
            }
            if let Some(v) = executor.max_concurrent {
                config.executor.bulkhead.max_concurrent = v;
            }
            if let Some(v) = executor.acquire_timeout_ms {
                config.executor.bulkhead.acquire_timeout_ms = v;
            }
            if let Some(v) = executor.retry_max_attempts {
                config.executor.retry = config.executor.retry.with_max_attempts(v);
            }
            if let Some(v) = executor.retry_backoff_ms {
                config.executor.retry = config.executor.retry.with_backoff_ms(v);
            }
        }
        if let Some(rebuild) = file.rebuild {
            if let Some(v) = rebuild.window_days {
                config.rebuild = config.rebuild.with_window_days(v);
            }
            if let Some(v) = rebuild.request_delay_ms {
                config.rebuild = config.rebuild.with_request_delay_ms(v);
            }
        }
        if let Some(logging) = file.logging {
            if let Some(v) = logging.format {
                config.logging.format = LogFormat::parse(&v);
            }
            if let Some(v) = logging.filter {
                config.logging.filter = v;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }

        config
    }
}
