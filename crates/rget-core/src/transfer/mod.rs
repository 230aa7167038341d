//! Resumable single-stream HTTP transfer driver.
//!
//! One transfer is a sequence of attempts; one attempt is a sequence of
//! segment requests (one open-ended request, or aligned chunks). Bytes always
//! land in offset order in a single working file, so the file length is the
//! resume offset. Failures are classified by [`crate::retry`] into resume,
//! restart from zero, or give up.

mod segment;
mod state;

pub use crate::retry::TransferError;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::chunk::ChunkScheduler;
use crate::control::CancelToken;
use crate::negotiate::ResourceIdentity;
use crate::progress::{ProgressReporter, ProgressSink, RateLimiter};
use crate::request::TransferRequest;
use crate::retry::{RetryController, RetryDecision, RetryPolicy};
use crate::storage::OutputFile;
use crate::transport::{CurlTransport, SegmentRequest, Transport};
use crate::validate::verify_total;

use segment::{SegmentDone, SegmentIo, SegmentSink};
use state::TransferState;

/// Largest curl receive buffer used to smooth pacing under a rate limit.
const PACED_BUFFER_MAX: u64 = 16 * 1024;
/// Smallest receive buffer curl accepts.
const PACED_BUFFER_MIN: u64 = 1024;

/// Summary of a finished transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    /// Final location of the downloaded file.
    pub path: PathBuf,
    /// Size of the file.
    pub bytes: u64,
    /// Total declared by the server, if any.
    pub total: Option<u64>,
    pub attempts: u32,
    pub retries_used: u32,
    /// Attempts that started again from byte zero.
    pub restarts: u32,
    /// Segment requests that got an accepted response.
    pub segments: u32,
    pub elapsed: Duration,
    /// The file was already complete; no body bytes were transferred.
    pub already_complete: bool,
}

/// Final error of a failed transfer.
#[derive(Debug, Error)]
#[error("{error} (after {attempts} attempt(s), {bytes_on_disk} bytes kept)")]
pub struct TransferFailure {
    #[source]
    pub error: TransferError,
    pub attempts: u32,
    /// Bytes left in the working file for a later resume.
    pub bytes_on_disk: u64,
}

/// HTTP(S) downloader over a pluggable transport (libcurl by default).
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader<T: Transport = CurlTransport> {
    transport: T,
}

impl HttpDownloader<CurlTransport> {
    pub fn new() -> Self {
        Self::with_transport(CurlTransport::new())
    }
}

impl<T: Transport> HttpDownloader<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run `request` to completion, failure or cancellation.
    ///
    /// Progress snapshots go to `progress` (a `Starting` one first, then
    /// throttled `InProgress` ones, then exactly one `Finished` or `Error`).
    pub fn download(
        &self,
        request: &TransferRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<TransferReport, TransferFailure> {
        let started = Instant::now();
        let mut reporter = ProgressReporter::new(request.progress_interval);

        let mut file = match OutputFile::prepare(
            &request.dest,
            request.part_file,
            request.resume,
            request.size_hint,
        ) {
            Ok(f) => f,
            Err(error) => {
                progress.on_progress(&reporter.error(0, None, error.to_string()));
                return Err(TransferFailure {
                    error,
                    attempts: 0,
                    bytes_on_disk: 0,
                });
            }
        };
        tracing::info!(
            url = %request.url,
            dest = %request.dest.display(),
            resume_from = file.len(),
            chunk_size = ?request.chunk_size,
            rate_limit = ?request.rate_limit,
            "transfer starting"
        );
        progress.on_progress(&reporter.starting(file.len(), None));

        let mut retry = RetryController::new(RetryPolicy {
            max_retries: request.max_retries,
            sleep: request.retry_sleep,
            resume: request.resume,
            range_fallback: request.range_fallback,
        });
        let mut rate = RateLimiter::new(request.rate_limit);
        let mut state = TransferState::new();

        loop {
            let attempt = retry.begin_attempt();
            let result = {
                let mut io = SegmentIo {
                    file: &mut file,
                    rate: &mut rate,
                    reporter: &mut reporter,
                    progress: &mut *progress,
                    cancel,
                };
                self.run_attempt(request, &mut io, &mut state)
            };
            let error = match result {
                Ok(()) => {
                    retry.succeed();
                    break;
                }
                Err(e) => e,
            };

            let decision = match error {
                TransferError::Cancelled => {
                    retry.fail();
                    RetryDecision::NoRetry
                }
                ref e => retry.on_failure(e),
            };
            let wait = match decision {
                RetryDecision::NoRetry => {
                    tracing::info!(attempt, error = %error, "giving up");
                    return Err(self.fail(error, &retry, &file, &mut reporter, progress, &state));
                }
                RetryDecision::ResumeAfter(d) => {
                    tracing::warn!(
                        attempt,
                        offset = file.len(),
                        error = %error,
                        retry_in_ms = d.as_millis() as u64,
                        "attempt failed, resuming"
                    );
                    d
                }
                RetryDecision::RestartAfter(d) => {
                    tracing::warn!(
                        attempt,
                        error = %error,
                        retry_in_ms = d.as_millis() as u64,
                        "attempt failed, restarting"
                    );
                    tracing::info!(discarded = file.len(), "restarting from zero");
                    if let Err(e) = file.truncate() {
                        return Err(self.fail(e, &retry, &file, &mut reporter, progress, &state));
                    }
                    state.reset_resource();
                    d
                }
            };
            if !cancel.sleep(wait) {
                retry.fail();
                return Err(self.fail(
                    TransferError::Cancelled,
                    &retry,
                    &file,
                    &mut reporter,
                    progress,
                    &state,
                ));
            }
        }

        let bytes = file.len();
        let finalized = file.sync().and_then(|_| file.finalize(&request.dest));
        if let Err(error) = finalized {
            progress.on_progress(&reporter.error(bytes, state.total, error.to_string()));
            return Err(TransferFailure {
                error,
                attempts: retry.attempts(),
                bytes_on_disk: bytes,
            });
        }
        progress.on_progress(&reporter.finished(bytes));

        let report = TransferReport {
            path: request.dest.clone(),
            bytes,
            total: state.total,
            attempts: retry.attempts(),
            retries_used: retry.retries_used(),
            restarts: retry.restarts(),
            segments: state.segments,
            elapsed: started.elapsed(),
            already_complete: state.confirmed_complete && state.received == 0,
        };
        tracing::info!(
            dest = %report.path.display(),
            bytes = report.bytes,
            attempts = report.attempts,
            restarts = report.restarts,
            segments = report.segments,
            elapsed_ms = report.elapsed.as_millis() as u64,
            already_complete = report.already_complete,
            "transfer finished"
        );
        Ok(report)
    }

    /// One attempt: request segments from the current offset until the
    /// resource is complete, then verify the byte count.
    fn run_attempt(
        &self,
        request: &TransferRequest,
        io: &mut SegmentIo<'_>,
        state: &mut TransferState,
    ) -> Result<(), TransferError> {
        let scheduler = ChunkScheduler::new(request.chunk_size);
        let buffer_size = request.buffer_size.or_else(|| {
            request
                .rate_limit
                .map(|r| r.clamp(PACED_BUFFER_MIN, PACED_BUFFER_MAX) as usize)
        });

        while !state.is_complete(io.file.len()) {
            if io.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            let offset = io.file.len();
            let range = scheduler.next_range(offset, state.total);
            let segment = SegmentRequest {
                url: request.url.as_str(),
                range,
                headers: &request.headers,
                connect_timeout: request.connect_timeout,
                stall_timeout: request.stall_timeout,
                buffer_size,
            };
            tracing::debug!(
                offset,
                range = ?range.map(|r| r.header_value()),
                "requesting segment"
            );

            let known_total = state.total;
            let identity = state.identity.clone();
            let mut sink = SegmentSink::new(io, range, known_total, identity.as_ref());
            let result = self.transport.fetch(&segment, &mut sink);

            if let Some(plan) = sink.plan() {
                if state.total.is_none() {
                    if let (Some(hint), Some(total)) = (request.size_hint, plan.total) {
                        if hint != total {
                            tracing::info!(hint, total, "server size differs from size hint");
                        }
                    }
                }
                state.observe(&plan);
                if state.identity.is_none() {
                    state.identity = sink.response().map(ResourceIdentity::from_response);
                }
            }
            state.received += sink.received();
            let done = sink.finish(result)?;
            state.segments += 1;

            match done {
                SegmentDone::AlreadyComplete { total } => {
                    tracing::debug!(total, "local file already complete");
                    state.total = Some(total);
                    state.confirmed_complete = true;
                }
                SegmentDone::Received { plan, bytes } => {
                    tracing::debug!(
                        start = plan.start,
                        bytes,
                        total = ?state.total,
                        "segment complete"
                    );
                    let requested = range.and_then(|r| r.len());
                    // Without a declared total the end of the resource is an
                    // open-ended EOF, or a chunk shorter than asked for.
                    if plan.whole_resource
                        || (state.total.is_none()
                            && (bytes == 0 || requested.map_or(true, |len| bytes < len)))
                    {
                        state.ended = true;
                    }
                }
            }
        }

        let on_disk = io.file.on_disk_len()?;
        verify_total(io.file.len(), on_disk, state.total)
    }

    fn fail(
        &self,
        error: TransferError,
        retry: &RetryController,
        file: &OutputFile,
        reporter: &mut ProgressReporter,
        progress: &mut dyn ProgressSink,
        state: &TransferState,
    ) -> TransferFailure {
        progress.on_progress(&reporter.error(file.len(), state.total, error.to_string()));
        TransferFailure {
            error,
            attempts: retry.attempts(),
            bytes_on_disk: file.len(),
        }
    }
}
