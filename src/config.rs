use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::manifest::types::ManifestSource;

// =============================================================================
// Platform constants
// =============================================================================

/// Application id the host platform uses in legacy install manifests
pub const PLATFORM_APP_ID: &str = "zotero@chnm.gmu.edu";

/// Target platform lines releases are resolved for, in catalog order
pub const TARGET_VERSIONS: [&str; 2] = ["7", "6"];

/// Highest platform range a legacy install manifest can declare
pub const LEGACY_MAX_VERSION: &str = "6.*";

// =============================================================================
// Remote constants
// =============================================================================

/// Default base URL for GitHub API
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// GitHub REST API version header value
pub const DEFAULT_GITHUB_API_VERSION: &str = "2022-11-28";

/// Page size used when listing releases
pub const RELEASES_PER_PAGE: usize = 100;

/// Upper bound on release pages fetched per repository
pub const MAX_RELEASE_PAGES: usize = 10;

/// Content type GitHub reports for uploaded XPI files
pub const XPI_CONTENT_TYPE: &str = "application/x-xpinstall";

/// Content type GitHub reports for zipped uploads
pub const ZIP_CONTENT_TYPE: &str = "application/x-zip-compressed";

/// Download mirror prefix; the GitHub URL is passed percent-encoded in `q`
pub const GH_PROXY_BASE: &str = "https://gh-proxy.com/";

/// Drop-in GitHub mirror domain
pub const KKGITHUB_DOMAIN: &str = "kkgithub.com";

// =============================================================================
// Time-related constants
// =============================================================================

/// Timeout for GitHub API requests in seconds
pub const API_TIMEOUT_SECS: u64 = 30;

/// Timeout for artifact downloads in seconds
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Retries for a failed remote call before giving up
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay of the exponential retry backoff in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Number of repositories processed concurrently
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Scraper configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScraperConfig {
    /// Directory of tracked addon files (`*.json` with a `repo` key)
    pub input_dir: PathBuf,
    /// Catalog file written by `scrape`
    pub output_file: PathBuf,
    pub github: GitHubConfig,
    pub cache: CacheConfig,
    /// Previously published catalogs used to fill gaps in the new one
    pub previous_info_urls: Vec<String>,
    pub max_workers: usize,
    pub full_rebuild: bool,
    pub max_releases_per_repo: Option<usize>,
    /// Follow `update_url` manifests to pick up newer builds
    pub check_update_url: bool,
    /// Manifest parse order used when building the release cache
    pub source_order: Vec<ManifestSource>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("addons"),
            output_file: PathBuf::from("addon_infos.json"),
            github: GitHubConfig::default(),
            cache: CacheConfig::default(),
            previous_info_urls: Vec::new(),
            max_workers: DEFAULT_MAX_WORKERS,
            full_rebuild: false,
            max_releases_per_repo: None,
            check_update_url: true,
            source_order: ManifestSource::DEFAULT_ORDER.to_vec(),
        }
    }
}

impl ScraperConfig {
    /// Load configuration from a JSON file, using defaults for missing fields
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// GitHub API configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GitHubConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub api_version: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API.to_string(),
            token: None,
            api_version: DEFAULT_GITHUB_API_VERSION.to_string(),
            timeout_secs: API_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl GitHubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Release cache location: a directory for `files`, a database file for `sqlite`
    pub release_cache: PathBuf,
    pub backend: StoreBackend,
    /// Shared download cache, reused across runs
    pub artifact_dir: PathBuf,
    /// Per-run working copies of downloaded artifacts
    pub runtime_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            release_cache: PathBuf::from("release_cache"),
            backend: StoreBackend::Files,
            artifact_dir: PathBuf::from("caches"),
            runtime_dir: PathBuf::from("xpis"),
        }
    }
}

/// Durable storage used for the release cache
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One JSON document per repository in a directory
    #[default]
    Files,
    /// One row per repository in a SQLite database
    Sqlite,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Returns the path to the data directory for addon-scraper.
/// Uses $XDG_DATA_HOME/addon-scraper if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/addon-scraper,
/// or ./addon-scraper if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the default path of the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("addon-scraper.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("addon-scraper")
}
