//! Immutable description of one download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{RangeFallback, TransferConfig};
use crate::retry::RetrySleep;
use crate::transfer::TransferError;

/// Everything the driver needs to run one transfer. Built once, never mutated
/// while the transfer runs.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: url::Url,
    pub dest: PathBuf,
    /// Size the caller expects; only used for sanity checks on local state.
    pub size_hint: Option<u64>,
    pub chunk_size: Option<u64>,
    pub resume: bool,
    /// Bytes per second.
    pub rate_limit: Option<u64>,
    pub max_retries: u32,
    pub retry_sleep: RetrySleep,
    pub headers: Vec<(String, String)>,
    pub connect_timeout: Duration,
    pub stall_timeout: Duration,
    pub progress_interval: Duration,
    pub part_file: bool,
    pub range_fallback: RangeFallback,
    pub buffer_size: Option<usize>,
}

impl TransferRequest {
    pub fn builder(url: impl Into<String>, dest: impl AsRef<Path>) -> TransferRequestBuilder {
        TransferRequestBuilder::with_config(
            url.into(),
            dest.as_ref().to_path_buf(),
            &TransferConfig::default(),
        )
    }

    /// Builder seeded from a loaded config file. Values the file holds but a
    /// request cannot use are reported by [`TransferRequestBuilder::build`].
    pub fn from_config(
        url: impl Into<String>,
        dest: impl AsRef<Path>,
        cfg: &TransferConfig,
    ) -> TransferRequestBuilder {
        TransferRequestBuilder::with_config(url.into(), dest.as_ref().to_path_buf(), cfg)
    }

    /// Path bytes are streamed into: `<dest>.part` or `dest` itself.
    pub fn working_path(&self) -> PathBuf {
        if self.part_file {
            crate::storage::temp_path(&self.dest)
        } else {
            self.dest.clone()
        }
    }
}

/// Builder for [`TransferRequest`]; defaults match [`TransferConfig::default`].
#[derive(Debug, Clone)]
pub struct TransferRequestBuilder {
    url: String,
    dest: PathBuf,
    size_hint: Option<u64>,
    chunk_size: Option<u64>,
    resume: bool,
    rate_limit: Option<u64>,
    max_retries: u32,
    retry_sleep: RetrySleep,
    headers: Vec<(String, String)>,
    connect_timeout: Duration,
    stall_timeout: Duration,
    progress_interval: Duration,
    part_file: bool,
    range_fallback: RangeFallback,
    buffer_size: Option<usize>,
    /// Config value rejected while seeding the builder.
    config_error: Option<String>,
}

impl TransferRequestBuilder {
    fn with_config(url: String, dest: PathBuf, cfg: &TransferConfig) -> Self {
        let (retry_sleep, config_error) = match RetrySleep::from_config(&cfg.retry) {
            Ok(sleep) => (sleep, None),
            Err(e) => (
                RetrySleep::Fixed(Duration::ZERO),
                Some(format!("retry sleep_secs {}: {}", cfg.retry.sleep_secs, e)),
            ),
        };
        Self {
            url,
            dest,
            size_hint: None,
            chunk_size: cfg.chunk_size,
            resume: cfg.resume,
            rate_limit: cfg.rate_limit,
            max_retries: cfg.max_retries,
            retry_sleep,
            headers: Vec::new(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            stall_timeout: Duration::from_secs(cfg.stall_timeout_secs),
            progress_interval: Duration::from_millis(cfg.progress_interval_ms),
            part_file: cfg.part_file,
            range_fallback: cfg.range_fallback,
            buffer_size: cfg.buffer_size,
            config_error,
        }
    }

    pub fn size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    pub fn chunk_size(mut self, size: Option<u64>) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn rate_limit(mut self, bytes_per_sec: Option<u64>) -> Self {
        self.rate_limit = bytes_per_sec;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn retry_sleep(mut self, sleep: RetrySleep) -> Self {
        self.retry_sleep = sleep;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn part_file(mut self, enabled: bool) -> Self {
        self.part_file = enabled;
        self
    }

    pub fn range_fallback(mut self, fallback: RangeFallback) -> Self {
        self.range_fallback = fallback;
        self
    }

    pub fn buffer_size(mut self, size: Option<usize>) -> Self {
        self.buffer_size = size;
        self
    }

    /// Validate and freeze the request.
    pub fn build(self) -> Result<TransferRequest, TransferError> {
        if let Some(msg) = self.config_error {
            return Err(TransferError::InvalidRequest(msg));
        }
        let url = url::Url::parse(&self.url)
            .map_err(|e| TransferError::InvalidRequest(format!("malformed URL {:?}: {}", self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransferError::InvalidRequest(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }
        if self.dest.file_name().is_none() {
            return Err(TransferError::InvalidRequest(format!(
                "destination {} has no file name",
                self.dest.display()
            )));
        }
        if self.chunk_size == Some(0) {
            return Err(TransferError::InvalidRequest("chunk_size must be > 0".into()));
        }
        if self.rate_limit == Some(0) {
            return Err(TransferError::InvalidRequest("rate_limit must be > 0".into()));
        }
        for (name, _) in &self.headers {
            if name.trim().eq_ignore_ascii_case("range") {
                return Err(TransferError::InvalidRequest(
                    "Range header is managed by the transfer engine".into(),
                ));
            }
        }
        Ok(TransferRequest {
            url,
            dest: self.dest,
            size_hint: self.size_hint,
            chunk_size: self.chunk_size,
            resume: self.resume,
            rate_limit: self.rate_limit,
            max_retries: self.max_retries,
            retry_sleep: self.retry_sleep,
            headers: self.headers,
            connect_timeout: self.connect_timeout,
            stall_timeout: self.stall_timeout,
            progress_interval: self.progress_interval,
            part_file: self.part_file,
            range_fallback: self.range_fallback,
            buffer_size: self.buffer_size,
        })
    }
}
