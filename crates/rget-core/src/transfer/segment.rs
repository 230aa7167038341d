//! Body sink for one segment request: negotiates the response, validates the
//! byte count, appends to the output file, paces reads and reports progress.

use std::time::Instant;

use crate::control::CancelToken;
use crate::negotiate::{
    negotiate, ByteRange, Negotiated, ResourceIdentity, SegmentPlan, SegmentResponse,
};
use crate::progress::{ProgressReporter, ProgressSink, RateLimiter};
use crate::storage::OutputFile;
use crate::transport::{BodySink, Flow, StreamEnd, TransportError};
use crate::validate::SegmentValidator;

use super::TransferError;

/// Verdict for one segment after the stream ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SegmentDone {
    Received { plan: SegmentPlan, bytes: u64 },
    AlreadyComplete { total: u64 },
}

/// Shared per-transfer resources a segment sink writes through.
pub(super) struct SegmentIo<'a> {
    pub file: &'a mut OutputFile,
    pub rate: &'a mut RateLimiter,
    pub reporter: &'a mut ProgressReporter,
    pub progress: &'a mut dyn ProgressSink,
    pub cancel: &'a CancelToken,
}

pub(super) struct SegmentSink<'a, 'io> {
    io: &'a mut SegmentIo<'io>,
    requested: Option<ByteRange>,
    offset: u64,
    known_total: Option<u64>,
    identity: Option<&'a ResourceIdentity>,
    response: Option<SegmentResponse>,
    negotiated: Option<Negotiated>,
    validator: Option<SegmentValidator>,
    error: Option<TransferError>,
}

impl<'a, 'io> SegmentSink<'a, 'io> {
    pub fn new(
        io: &'a mut SegmentIo<'io>,
        requested: Option<ByteRange>,
        known_total: Option<u64>,
        identity: Option<&'a ResourceIdentity>,
    ) -> Self {
        let offset = io.file.len();
        Self {
            io,
            requested,
            offset,
            known_total,
            identity,
            response: None,
            negotiated: None,
            validator: None,
            error: None,
        }
    }

    /// Plan accepted for this segment, even if its body later failed.
    pub fn plan(&self) -> Option<SegmentPlan> {
        match self.negotiated {
            Some(Negotiated::Segment(plan)) => Some(plan),
            _ => None,
        }
    }

    /// Response headers, once the server answered.
    pub fn response(&self) -> Option<&SegmentResponse> {
        self.response.as_ref()
    }

    /// Body bytes written by this segment.
    pub fn received(&self) -> u64 {
        self.validator.map_or(0, |v| v.received())
    }

    /// Combine what the sink saw with how the transport ended.
    pub fn finish(
        mut self,
        result: Result<StreamEnd, TransportError>,
    ) -> Result<SegmentDone, TransferError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if let Some(Negotiated::AlreadyComplete { total }) = self.negotiated {
            return Ok(SegmentDone::AlreadyComplete { total });
        }
        match result {
            Err(TransportError::PartialBody(msg)) => match self.validator {
                Some(v) => v.finish().and_then(|_| {
                    Err(TransferError::Transport(TransportError::PartialBody(msg)))
                }),
                None => Err(TransportError::PartialBody(msg).into()),
            },
            Err(e) => Err(e.into()),
            Ok(StreamEnd::Stopped) => Err(if self.io.cancel.is_cancelled() {
                TransferError::Cancelled
            } else {
                TransportError::Other("stream stopped without a verdict".into()).into()
            }),
            Ok(StreamEnd::Eof) => match (self.plan(), self.validator) {
                (Some(plan), Some(v)) => v.finish().map(|bytes| SegmentDone::Received { plan, bytes }),
                _ => Err(TransportError::Other("no response received".into()).into()),
            },
        }
    }

    fn stop(&mut self, err: TransferError) -> Flow {
        self.error = Some(err);
        Flow::Stop
    }

    fn total(&self) -> Option<u64> {
        self.plan().and_then(|p| p.total).or(self.known_total)
    }
}

impl BodySink for SegmentSink<'_, '_> {
    fn on_response(&mut self, status: u32, headers: &[String]) -> Flow {
        let resp = SegmentResponse::from_headers(headers, status, self.requested.as_ref());
        tracing::debug!(
            status = resp.status,
            offset = self.offset,
            content_length = ?resp.content_length,
            content_range = ?resp.content_range,
            accept_ranges = ?resp.accept_ranges,
            range_honored = resp.range_honored,
            "segment response"
        );
        let negotiated = negotiate(&resp, self.requested, self.known_total);
        let identity_conflict = self.identity.and_then(|id| id.conflict_with(&resp));
        self.response = Some(resp);
        match negotiated {
            Err(e) => self.stop(e),
            Ok(Negotiated::AlreadyComplete { total }) => {
                self.negotiated = Some(Negotiated::AlreadyComplete { total });
                Flow::Stop
            }
            Ok(Negotiated::Segment(plan)) => {
                self.negotiated = Some(Negotiated::Segment(plan));
                if let Some(reason) = identity_conflict {
                    return self.stop(TransferError::ResourceChanged(reason));
                }
                self.validator = Some(SegmentValidator::new(plan.expected_len));
                Flow::Continue
            }
        }
    }

    fn on_data(&mut self, data: &[u8]) -> Flow {
        if self.io.cancel.is_cancelled() {
            return self.stop(TransferError::Cancelled);
        }
        let Some(validator) = self.validator.as_mut() else {
            return Flow::Stop;
        };
        let allowed = validator.admit(data.len());
        if allowed > 0 {
            if let Err(e) = self.io.file.write_all(&data[..allowed]) {
                return self.stop(e);
            }
        }
        if validator.overflowed() {
            let err = match validator.finish() {
                Err(e) => e,
                Ok(_) => TransferError::Overflow {
                    expected: validator.received(),
                    received: validator.received() + (data.len() - allowed) as u64,
                },
            };
            return self.stop(err);
        }

        let now = Instant::now();
        let total = self.total();
        if let Some(snapshot) = self.io.reporter.observe(self.io.file.len(), total, now) {
            self.io.progress.on_progress(&snapshot);
        }
        let pause = self.io.rate.consume(allowed as u64, now);
        if !pause.is_zero() && !self.io.cancel.sleep(pause) {
            return self.stop(TransferError::Cancelled);
        }
        Flow::Continue
    }

    fn on_idle(&mut self) -> Flow {
        if self.io.cancel.is_cancelled() {
            return self.stop(TransferError::Cancelled);
        }
        Flow::Continue
    }
}
