//! Process-wide configuration
//!
//! A [`Config`] is built once at startup from defaults, an optional JSON file
//! and command-line overrides, then passed by reference to the components that
//! need it. Nothing re-reads configuration after startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

/// Default EDGAR company browse endpoint
pub const DEFAULT_EDGAR_URL: &str = "https://www.sec.gov/cgi-bin/browse-edgar";

/// Default EDGAR submissions API base
pub const DEFAULT_SUBMISSIONS_URL: &str = "https://data.sec.gov/submissions";

/// Default bounded wait for each external request
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// File name of the cache table inside the data directory
const CACHE_FILE_NAME: &str = "cik.psv";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for this schema
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Location of the pipe-delimited cache table
    pub cache_file: PathBuf,
    /// User-Agent sent to SEC endpoints
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// EDGAR company browse endpoint
    pub edgar_url: String,
    /// EDGAR submissions API base
    pub submissions_url: String,
}

/// Values accepted in a JSON config file; all optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    cache_file: Option<PathBuf>,
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
    edgar_url: Option<String>,
    submissions_url: Option<String>,
}

/// Command-line overrides applied on top of file values
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cache_file: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_file: default_cache_file(),
            user_agent: format!(
                "{}/{} (+https://www.sec.gov/os/accessing-edgar-data)",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            edgar_url: DEFAULT_EDGAR_URL.to_string(),
            submissions_url: DEFAULT_SUBMISSIONS_URL.to_string(),
        }
    }
}

impl Config {
    /// Creates a default config whose cache lives at `cache_file`
    pub fn with_cache_file(cache_file: impl Into<PathBuf>) -> Self {
        Self {
            cache_file: cache_file.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from an optional JSON file plus overrides.
    ///
    /// # Arguments
    /// * `path` - JSON config file; must exist when given
    /// * `overrides` - values from the command line, taking precedence
    ///
    /// # Returns
    /// * `Ok(Config)` with defaults filled in
    /// * `Err(ConfigError)` if the file cannot be read or parsed
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => read_file(path)?,
            None => FileConfig::default(),
        };

        let defaults = Self::default();
        Ok(Self {
            cache_file: overrides
                .cache_file
                .or(file.cache_file)
                .unwrap_or(defaults.cache_file),
            user_agent: overrides
                .user_agent
                .or(file.user_agent)
                .unwrap_or(defaults.user_agent),
            timeout_secs: overrides
                .timeout_secs
                .or(file.timeout_secs)
                .unwrap_or(defaults.timeout_secs),
            edgar_url: file.edgar_url.unwrap_or(defaults.edgar_url),
            submissions_url: file.submissions_url.unwrap_or(defaults.submissions_url),
        })
    }

    /// Per-request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// XDG data directory location, or the working directory if there is no home
fn default_cache_file() -> PathBuf {
    match ProjectDirs::from("", "", "cikcache") {
        Some(dirs) => dirs.data_dir().join(CACHE_FILE_NAME),
        None => PathBuf::from(CACHE_FILE_NAME),
    }
}
