use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::{RetryPolicy, MAX_JITTER};
use crate::transport::HttpOptions;
use crate::url_model::PathMappingConfig;

/// Default number of concurrently running fetch units.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Upper bound on concurrently running fetch units.
pub const MAX_CONCURRENCY: usize = 1024;

/// Longest configurable delay (backoff base/ceiling, politeness pause).
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// `secs` as a duration if it is a number of seconds in `[0, MAX_WAIT]`.
pub(crate) fn bounded_secs(secs: f64) -> Option<Duration> {
    if !(0.0..=MAX_WAIT.as_secs_f64()).contains(&secs) {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// Retry policy parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per URL (including the first).
    pub max_tries: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds (before jitter).
    pub max_delay_secs: u64,
    /// Random extra fraction added to each wait, in [0, jitter].
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_jitter() -> f64 {
    0.25
}

impl RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, value| Err(ConfigError::InvalidRetry { field, value });
        if bounded_secs(self.base_delay_secs).is_none() {
            return invalid("base_delay_secs", self.base_delay_secs);
        }
        if Duration::from_secs(self.max_delay_secs) > MAX_WAIT {
            return invalid("max_delay_secs", self.max_delay_secs as f64);
        }
        if !(0.0..=MAX_JITTER).contains(&self.jitter) {
            return invalid("jitter", self.jitter);
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: 10,
            base_delay_secs: 1.0,
            max_delay_secs: 60,
            jitter: default_jitter(),
        }
    }
}

/// Transfer timeouts (optional `[http]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Abort when throughput stays below 1 KiB/s for this long.
    pub low_speed_time_secs: u64,
    /// Hard cap on a single GET, including the body transfer.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_time_secs: 60,
            timeout_secs: 3600,
        }
    }
}

/// Global configuration loaded from `~/.config/bulkdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Maximum number of URLs downloading at once.
    pub concurrency: usize,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional transfer timeouts; if missing, built-in defaults are used.
    #[serde(default)]
    pub http: Option<HttpConfig>,
    /// Seconds to wait after each successful download before the slot takes new work.
    #[serde(default)]
    pub pause_after_download_secs: f64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: None,
            http: None,
            pause_after_download_secs: 0.0,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bulkdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BulkConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BulkConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: BulkConfig = toml::from_str(&data)?;
    Ok(cfg)
}

/// Invalid run configuration. Fatal before anything is dispatched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid filter regex: {0}")]
    InvalidRegex(#[from] regex::Error),
    #[error("invalid download directory {path}: {reason}")]
    InvalidDirectory { path: PathBuf, reason: String },
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("concurrency {0} exceeds the maximum of {}", MAX_CONCURRENCY)]
    ConcurrencyTooHigh(usize),
    #[error("max tries must be at least 1")]
    ZeroMaxTries,
    #[error("strip prefixes must not be empty")]
    EmptyPrefix,
    #[error("invalid pause duration: {0} (expected 0 to 86400 seconds)")]
    InvalidPause(f64),
    #[error("invalid retry setting {field} = {value}")]
    InvalidRetry { field: &'static str, value: f64 },
}

/// Per-run options as assembled by the caller (CLI flags). `None` falls back to
/// the file configuration.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub download_dir: PathBuf,
    pub prefixes: Vec<String>,
    pub auto_detect_prefix: bool,
    pub filter: Option<String>,
    pub reverse: bool,
    pub randomize: bool,
    pub max_tries: Option<u32>,
    pub concurrency: Option<usize>,
    pub dry_run: bool,
    pub overwrite: bool,
    pub pause_after_download_secs: Option<f64>,
}

/// Validated configuration for one run, passed explicitly to every component.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub download_dir: PathBuf,
    pub mapping: PathMappingConfig,
    pub filter: Option<Regex>,
    pub reverse: bool,
    pub randomize: bool,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub http: HttpOptions,
    pub dry_run: bool,
    pub overwrite: bool,
    pub pause_after_download: Duration,
}

impl RunConfig {
    /// Merge `settings` over `file` and validate the result.
    ///
    /// Creates the download directory unless this is a dry run.
    pub fn from_settings(settings: RunSettings, file: &BulkConfig) -> Result<Self, ConfigError> {
        let concurrency = settings.concurrency.unwrap_or(file.concurrency);
        if concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::ConcurrencyTooHigh(concurrency));
        }

        let mut retry_cfg = file.retry.clone().unwrap_or_default();
        if let Some(n) = settings.max_tries {
            retry_cfg.max_tries = n;
        }
        if retry_cfg.max_tries == 0 {
            return Err(ConfigError::ZeroMaxTries);
        }
        retry_cfg.validate()?;

        if settings.prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyPrefix);
        }

        let pause_secs = settings
            .pause_after_download_secs
            .unwrap_or(file.pause_after_download_secs);
        let pause = bounded_secs(pause_secs).ok_or(ConfigError::InvalidPause(pause_secs))?;

        let filter = settings.filter.as_deref().map(Regex::new).transpose()?;

        check_download_dir(&settings.download_dir, settings.dry_run)?;

        Ok(Self {
            download_dir: settings.download_dir,
            mapping: PathMappingConfig {
                prefixes: settings.prefixes,
                auto_detect: settings.auto_detect_prefix,
            },
            filter,
            reverse: settings.reverse,
            randomize: settings.randomize,
            concurrency,
            retry: retry_cfg.into(),
            http: file.http.clone().unwrap_or_default().into(),
            dry_run: settings.dry_run,
            overwrite: settings.overwrite,
            pause_after_download: pause,
        })
    }
}

fn check_download_dir(dir: &std::path::Path, dry_run: bool) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidDirectory {
        path: dir.to_path_buf(),
        reason,
    };
    if dir.as_os_str().is_empty() {
        return Err(invalid("empty path".to_string()));
    }
    if dir.exists() {
        if !dir.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }
        return Ok(());
    }
    if dry_run {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| invalid(e.to_string()))
}
