use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry sleep parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Pause between attempts in seconds (e.g. 0.25 = 250ms). With
    /// `backoff_max_secs` set this is the base of the exponential backoff.
    pub sleep_secs: f64,
    /// Upper bound for exponential backoff; `None` keeps the sleep fixed.
    #[serde(default)]
    pub backoff_max_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            sleep_secs: 1.0,
            backoff_max_secs: None,
        }
    }
}

/// What to do when a server ignores the Range header while resuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeFallback {
    /// Truncate the partial file and download from zero on the next attempt.
    #[default]
    Restart,
    /// Give up without consuming a retry.
    Fail,
}

/// Transfer defaults loaded from `~/.config/rget/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Maximum bytes per segment request (None = whole remaining range).
    #[serde(default)]
    pub chunk_size: Option<u64>,
    /// Continue an existing partial file instead of starting over.
    pub resume: bool,
    /// Throughput ceiling in bytes per second (None = unlimited).
    #[serde(default)]
    pub rate_limit: Option<u64>,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    #[serde(default)]
    pub retry: RetryConfig,
    pub connect_timeout_secs: u64,
    /// A read that stays below 1 byte/s for this long is treated as a timeout.
    pub stall_timeout_secs: u64,
    /// Minimum spacing of in-progress callbacks.
    pub progress_interval_ms: u64,
    /// Write to `<dest>.part` and rename on completion.
    pub part_file: bool,
    #[serde(default)]
    pub range_fallback: RangeFallback,
    /// Receive buffer size handed to libcurl (None = library default).
    #[serde(default)]
    pub buffer_size: Option<usize>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: None,
            resume: true,
            rate_limit: None,
            max_retries: 10,
            retry: RetryConfig::default(),
            connect_timeout_secs: 30,
            stall_timeout_secs: 60,
            progress_interval_ms: 250,
            part_file: true,
            range_fallback: RangeFallback::Restart,
            buffer_size: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rget")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TransferConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TransferConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TransferConfig = toml::from_str(&data)?;
    Ok(cfg)
}
