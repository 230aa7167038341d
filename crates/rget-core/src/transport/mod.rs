//! HTTP transport seam.
//!
//! One `fetch` performs one GET (optionally with a `Range` header) and pushes
//! the final response's headers and body into a [`BodySink`]. The sink can stop
//! the stream at any point; the transport then reports [`StreamEnd::Stopped`]
//! instead of an error. Everything above this module is transport-agnostic, so
//! the driver is tested against scripted transports.

mod curl_easy;

pub use curl_easy::CurlTransport;

use std::time::Duration;

use thiserror::Error;

use crate::negotiate::ByteRange;

/// Transport-level failure, already reduced to what retry classification needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connect timeout, or the stream stalled past the stall timeout.
    #[error("timed out: {0}")]
    Timeout(String),
    /// Connection refused, reset, DNS failure, empty reply.
    #[error("connection error: {0}")]
    Connection(String),
    /// Server closed the connection before the declared body length.
    #[error("partial body: {0}")]
    PartialBody(String),
    #[error("transport error: {0}")]
    Other(String),
}

/// What to send for one segment.
#[derive(Debug, Clone)]
pub struct SegmentRequest<'a> {
    pub url: &'a str,
    pub range: Option<ByteRange>,
    pub headers: &'a [(String, String)],
    pub connect_timeout: Duration,
    /// Abort if no byte arrives for this long.
    pub stall_timeout: Duration,
    pub buffer_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// How a fetch ended when the transport itself did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Server finished the body.
    Eof,
    /// The sink asked to stop.
    Stopped,
}

/// Receiver of one response.
pub trait BodySink {
    /// Header block of the final response (after redirects). Called exactly
    /// once per fetch that got a response, before any body byte.
    fn on_response(&mut self, status: u32, headers: &[String]) -> Flow;

    /// A block of body bytes, in order.
    fn on_data(&mut self, data: &[u8]) -> Flow;

    /// Periodic tick while the transfer is idle or slow.
    fn on_idle(&mut self) -> Flow {
        Flow::Continue
    }
}

pub trait Transport {
    fn fetch(
        &self,
        request: &SegmentRequest<'_>,
        sink: &mut dyn BodySink,
    ) -> Result<StreamEnd, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch(
        &self,
        request: &SegmentRequest<'_>,
        sink: &mut dyn BodySink,
    ) -> Result<StreamEnd, TransportError> {
        (**self).fetch(request, sink)
    }
}
