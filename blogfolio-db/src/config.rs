//! Configuration for the pagination engine and the connection pool
//!
//! Sources, lowest precedence first:
//! - Built-in defaults
//! - `~/.blogfolio/config.toml` (or an explicit path) with `[page]` and `[database]` tables
//! - Environment variables:
//!   - `DATABASE_URL`: PostgreSQL connection string
//!   - `BLOGFOLIO_MAX_CONNECTIONS`: pool size (default: 5)
//!   - `BLOGFOLIO_DEFAULT_PAGE_SIZE`: rows per page when none is requested (default: 20)
//!   - `BLOGFOLIO_MAX_PAGE_SIZE`: hard upper bound on rows per page (default: 100)
//!   - `BLOGFOLIO_SIMILARITY_THRESHOLD`: trigram match threshold (default: 0.1)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default items per page
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Maximum items per page
const MAX_PAGE_SIZE: u32 = 100;

/// Trigram similarity a title/name must exceed to count as a search match
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.1;

/// Default maximum connections for the pool
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Page sizing and search tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Rows returned when the caller does not ask for a limit
    pub default_limit: u32,
    /// Upper bound applied to every requested limit
    pub max_limit: u32,
    /// Trigram similarity above which a row matches a search term
    pub similarity_threshold: f64,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl PageConfig {
    /// Create config from environment variables, falling back to defaults for
    /// absent or unparsable values.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("BLOGFOLIO_DEFAULT_PAGE_SIZE") {
            self.default_limit = v;
        }
        if let Some(v) = env_parse("BLOGFOLIO_MAX_PAGE_SIZE") {
            self.max_limit = v;
        }
        if let Some(v) = env_parse("BLOGFOLIO_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = v;
        }
        self
    }

    /// Reject limits that cannot produce a page.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_limit == 0 || self.default_limit == 0 {
            return Err(ConfigError::Invalid {
                reason: "page limits must be positive".into(),
            });
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "default_limit ({}) exceeds max_limit ({})",
                    self.default_limit, self.max_limit
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Invalid {
                reason: "similarity_threshold must be within 0.0..=1.0".into(),
            });
        }
        Ok(())
    }
}

/// Connection pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl DbConfig {
    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(v) = env_parse("BLOGFOLIO_MAX_CONNECTIONS") {
            self.max_connections = v;
        }
        self
    }
}

/// Combined configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub page: PageConfig,
    pub database: DbConfig,
}

impl AppConfig {
    /// Get default config file path: ~/.blogfolio/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".blogfolio/config.toml")
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist; the default path is optional.
    /// Environment variables override file values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        let config = Self {
            page: config.page.with_env_overrides(),
            database: config.database.with_env_overrides(),
        };
        config.page.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}
