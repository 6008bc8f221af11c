//! Configuration management.
//!
//! Every section has defaults, so an empty (or absent) file is a valid
//! configuration.
//!
//! ```toml
//! [http]
//! timeout_secs = 15
//! connect_timeout_secs = 10
//!
//! [fetch]
//! stagger_ms = 50
//! max_concurrency = 64
//!
//! [download]
//! mirror_url = "mirror.example.org"
//! stagger_ms = 100
//! max_concurrency = 32
//! default_dir = "./downloads"
//!
//! [progress]
//! interval_ms = 200
//! stall_timeout_secs = 30
//! ```
//!
//! Environment variables prefixed with `PAPERFETCH__` override file values,
//! e.g. `PAPERFETCH__DOWNLOAD__MIRROR_URL`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Browser-like identification header sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/80.0.3987.132 Safari/537.36";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub fetch: FetchSettings,

    #[serde(default)]
    pub download: DownloadSettings,

    #[serde(default)]
    pub progress: ProgressSettings,
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Whole-request deadline
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Metadata fetch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Delay per position among concurrently scheduled requests
    #[serde(default = "default_fetch_stagger_ms")]
    pub stagger_ms: u64,

    /// Upper bound on in-flight page/detail requests
    #[serde(default = "default_fetch_concurrency")]
    pub max_concurrency: usize,
}

impl FetchSettings {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            stagger_ms: default_fetch_stagger_ms(),
            max_concurrency: default_fetch_concurrency(),
        }
    }
}

fn default_fetch_stagger_ms() -> u64 {
    50
}

fn default_fetch_concurrency() -> usize {
    64
}

/// Mirror download settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSettings {
    /// Mirror host or URL; a bare host gets `https://`
    #[serde(default)]
    pub mirror_url: Option<String>,

    #[serde(default = "default_download_stagger_ms")]
    pub stagger_ms: u64,

    #[serde(default = "default_download_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_download_dir")]
    pub default_dir: PathBuf,
}

impl DownloadSettings {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            mirror_url: None,
            stagger_ms: default_download_stagger_ms(),
            max_concurrency: default_download_concurrency(),
            default_dir: default_download_dir(),
        }
    }
}

fn default_download_stagger_ms() -> u64 {
    100
}

fn default_download_concurrency() -> usize {
    32
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

/// Progress monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSettings {
    /// Poll cadence
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// How long the fill level may stay unchanged before the batch counts as stalled
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
}

impl ProgressSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            stall_timeout_secs: default_stall_timeout_secs(),
        }
    }
}

fn default_interval_ms() -> u64 {
    200
}

fn default_stall_timeout_secs() -> u64 {
    30
}

/// Load configuration from an optional file plus `PAPERFETCH__*` environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(config::Environment::with_prefix("PAPERFETCH").separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Get the default configuration
pub fn get_config() -> Config {
    Config::default()
}
