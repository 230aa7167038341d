//! Downloader capability interface and dispatch by URL scheme.
//!
//! The engine only ships the HTTP(S) variant; hosts can register other
//! variants under their own schemes without touching the driver.

use std::collections::HashMap;

use crate::control::CancelToken;
use crate::progress::ProgressSink;
use crate::request::TransferRequest;
use crate::transfer::{HttpDownloader, TransferError, TransferFailure, TransferReport};
use crate::transport::Transport;

/// Anything that can carry out a [`TransferRequest`].
pub trait Downloader {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn start(
        &self,
        request: &TransferRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<TransferReport, TransferFailure>;
}

impl<T: Transport> Downloader for HttpDownloader<T> {
    fn name(&self) -> &'static str {
        "http"
    }

    fn start(
        &self,
        request: &TransferRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<TransferReport, TransferFailure> {
        self.download(request, progress, cancel)
    }
}

/// Scheme -> downloader table.
#[derive(Default)]
pub struct DownloaderRegistry {
    by_scheme: HashMap<String, Box<dyn Downloader + Send + Sync>>,
}

impl DownloaderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the curl-backed HTTP downloader for `http` and `https`.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        r.register("http", HttpDownloader::new());
        r.register("https", HttpDownloader::new());
        r
    }

    /// Register (or replace) the downloader for `scheme`.
    pub fn register(&mut self, scheme: &str, downloader: impl Downloader + Send + Sync + 'static) {
        self.by_scheme
            .insert(scheme.to_ascii_lowercase(), Box::new(downloader));
    }

    pub fn for_url(&self, url: &url::Url) -> Option<&(dyn Downloader + Send + Sync)> {
        self.by_scheme.get(url.scheme()).map(|d| d.as_ref())
    }

    /// Dispatch `request` to the downloader registered for its URL scheme.
    pub fn start(
        &self,
        request: &TransferRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<TransferReport, TransferFailure> {
        let Some(downloader) = self.for_url(&request.url) else {
            return Err(TransferFailure {
                error: TransferError::InvalidRequest(format!(
                    "no downloader for scheme {:?}",
                    request.url.scheme()
                )),
                attempts: 0,
                bytes_on_disk: 0,
            });
        };
        tracing::debug!(downloader = downloader.name(), url = %request.url, "dispatching transfer");
        downloader.start(request, progress, cancel)
    }
}
