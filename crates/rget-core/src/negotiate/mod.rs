//! Range negotiation.
//!
//! Builds the `Range` header for a segment request and interprets the
//! server's `Content-Range` / `Content-Length` answer to decide which bytes
//! are actually being served, whether the server honoured the range, and what
//! the authoritative total size is.

mod parse;

pub use parse::parse_content_range;
pub(crate) use parse::{parse_headers, parse_http_status};

use crate::transfer::TransferError;

/// Inclusive byte range asked of the server. `end == None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Range to send for a segment starting at `offset`. No header is sent for
    /// an open-ended request from zero.
    pub fn for_segment(offset: u64, end: Option<u64>) -> Option<ByteRange> {
        if offset == 0 && end.is_none() {
            return None;
        }
        Some(ByteRange { start: offset, end })
    }

    /// Number of bytes requested, if bounded.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start) + 1)
    }

    /// Value for the HTTP `Range` header.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Parsed `Content-Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRange {
    /// `bytes first-last/total` (`total == None` for `*`).
    Bytes {
        first: u64,
        last: u64,
        total: Option<u64>,
    },
    /// `bytes */total`, sent with 416.
    Unsatisfied { total: u64 },
}

/// What the server said about one segment request. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentResponse {
    pub status: u32,
    pub content_length: Option<u64>,
    pub content_range: Option<ContentRange>,
    pub accept_ranges: Option<bool>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// True if a range was requested and the server answered with a matching
    /// `Content-Range`.
    pub range_honored: bool,
}

impl SegmentResponse {
    /// Build from raw header lines. `fallback_status` is used when no status
    /// line was captured (the transport knows the code from elsewhere).
    pub fn from_headers(
        lines: &[String],
        fallback_status: u32,
        requested: Option<&ByteRange>,
    ) -> SegmentResponse {
        let h = parse_headers(lines);
        let range_honored = match (requested, h.content_range) {
            (Some(r), Some(ContentRange::Bytes { first, .. })) => first == r.start,
            _ => false,
        };
        SegmentResponse {
            status: h.status.unwrap_or(fallback_status),
            content_length: h.content_length,
            content_range: h.content_range,
            accept_ranges: h.accept_ranges,
            etag: h.etag,
            last_modified: h.last_modified,
            range_honored,
        }
    }
}

/// Validators of the remote resource captured from the first accepted segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl ResourceIdentity {
    pub fn from_response(resp: &SegmentResponse) -> Self {
        Self {
            etag: resp.etag.clone(),
            last_modified: resp.last_modified.clone(),
        }
    }

    /// Describes the first validator that differs. Absent values never conflict.
    pub fn conflict_with(&self, resp: &SegmentResponse) -> Option<String> {
        if let (Some(a), Some(b)) = (&self.etag, &resp.etag) {
            if a != b {
                return Some(format!("ETag {:?} -> {:?}", a, b));
            }
        }
        if let (Some(a), Some(b)) = (&self.last_modified, &resp.last_modified) {
            if a != b {
                return Some(format!("Last-Modified {:?} -> {:?}", a, b));
            }
        }
        None
    }
}

/// The bytes a response will deliver, as agreed with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Offset of the first body byte in the resource.
    pub start: u64,
    /// Body length, when declared.
    pub expected_len: Option<u64>,
    /// Resource size, when declared.
    pub total: Option<u64>,
    /// The body is the whole resource from byte 0 (no range in effect), so
    /// EOF ends the transfer.
    pub whole_resource: bool,
}

/// Outcome of interpreting a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiated {
    Segment(SegmentPlan),
    /// The local file already holds every byte; nothing to read.
    AlreadyComplete { total: u64 },
}

/// Interpret `resp` for the `requested` range (`None` is a plain GET from
/// zero). `known_total` is the size established by earlier segments of this
/// transfer, if any.
pub fn negotiate(
    resp: &SegmentResponse,
    requested: Option<ByteRange>,
    known_total: Option<u64>,
) -> Result<Negotiated, TransferError> {
    let offset = requested.map_or(0, |r| r.start);
    let negotiated = match resp.status {
        416 => match resp.content_range {
            Some(ContentRange::Unsatisfied { total }) if offset > 0 && total == offset => {
                Negotiated::AlreadyComplete { total }
            }
            // A chunk asked for past the end of a resource whose size was never
            // declared: the previous chunk was its last.
            None if offset > 0
                && known_total.is_none()
                && requested.is_some_and(|r| r.end.is_some()) =>
            {
                Negotiated::AlreadyComplete { total: offset }
            }
            _ => return Err(TransferError::RangeNotSatisfiable { offset }),
        },
        200 | 206 => match resp.content_range {
            Some(ContentRange::Bytes { first, last, total }) => {
                if first != offset {
                    if first == 0 {
                        return Err(TransferError::RangeIgnored { offset });
                    }
                    return Err(TransferError::RangeMismatch {
                        requested: offset,
                        served: format!("bytes {}-{}", first, last),
                    });
                }
                if last < first {
                    // `bytes N-(N-1)/N`: an empty tail at the very end.
                    match total {
                        Some(t) if t == offset && offset > 0 => Negotiated::AlreadyComplete { total: t },
                        _ => {
                            return Err(TransferError::RangeMismatch {
                                requested: offset,
                                served: format!("bytes {}-{}", first, last),
                            })
                        }
                    }
                } else {
                    Negotiated::Segment(SegmentPlan {
                        start: first,
                        expected_len: Some(last - first + 1),
                        total,
                        whole_resource: false,
                    })
                }
            }
            Some(ContentRange::Unsatisfied { .. }) => {
                return Err(TransferError::RangeMismatch {
                    requested: offset,
                    served: "bytes */total".to_string(),
                })
            }
            None if resp.status == 206 => {
                return Err(TransferError::RangeMismatch {
                    requested: offset,
                    served: "206 without Content-Range".to_string(),
                })
            }
            None if offset > 0 => {
                if resp.content_length == Some(offset) {
                    Negotiated::AlreadyComplete { total: offset }
                } else {
                    return Err(TransferError::RangeIgnored { offset });
                }
            }
            None => Negotiated::Segment(SegmentPlan {
                start: 0,
                expected_len: resp.content_length,
                total: resp.content_length,
                whole_resource: true,
            }),
        },
        status => return Err(TransferError::Http { status }),
    };

    let reported = match negotiated {
        Negotiated::Segment(plan) => plan.total,
        Negotiated::AlreadyComplete { total } => Some(total),
    };
    if let (Some(known), Some(reported)) = (known_total, reported) {
        if known != reported {
            return Err(TransferError::TotalChanged { known, reported });
        }
    }
    Ok(negotiated)
}
