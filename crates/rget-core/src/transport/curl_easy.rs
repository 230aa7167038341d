//! libcurl transport (blocking easy handle, one per segment request).

use std::cell::{Cell, RefCell};
use std::str;

use curl::easy::{Easy, List};

use super::{BodySink, Flow, SegmentRequest, StreamEnd, Transport, TransportError};
use crate::negotiate::parse_http_status;

/// Redirect limit for one request.
const MAX_REDIRECTS: u32 = 10;

/// Blocking curl transport. Stateless; a fresh easy handle is used per fetch
/// so no connection state leaks between attempts.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurlTransport;

impl CurlTransport {
    pub fn new() -> Self {
        CurlTransport
    }

    fn configure(easy: &mut Easy, request: &SegmentRequest<'_>) -> Result<(), curl::Error> {
        easy.url(request.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTS)?;
        easy.connect_timeout(request.connect_timeout)?;
        // Stall detection: below 1 byte/s for the whole window aborts with a timeout.
        easy.low_speed_limit(1)?;
        easy.low_speed_time(request.stall_timeout)?;
        easy.progress(true)?;
        if let Some(size) = request.buffer_size {
            easy.buffer_size(size)?;
        }
        if let Some(range) = request.range {
            easy.range(range.header_value().trim_start_matches("bytes="))?;
        }

        let mut list = List::new();
        for (k, v) in request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        if !request.headers.is_empty() {
            easy.http_headers(list)?;
        }
        Ok(())
    }
}

impl Transport for CurlTransport {
    fn fetch(
        &self,
        request: &SegmentRequest<'_>,
        sink: &mut dyn BodySink,
    ) -> Result<StreamEnd, TransportError> {
        let mut easy = Easy::new();
        Self::configure(&mut easy, request).map_err(map_curl_error)?;

        let lines: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let delivered = Cell::new(false);
        let stopped = Cell::new(false);
        let sink = RefCell::new(sink);

        // Hands the header block to the sink once, before the first body byte.
        let deliver = |status: u32| -> Flow {
            if delivered.replace(true) {
                return Flow::Continue;
            }
            let lines = lines.borrow();
            sink.borrow_mut().on_response(status, &lines)
        };

        let result = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        let line = s.trim_end();
                        let mut lines = lines.borrow_mut();
                        // Each redirect or interim response starts a new block.
                        if line.starts_with("HTTP/") {
                            lines.clear();
                        }
                        if !line.is_empty() {
                            lines.push(line.to_string());
                        }
                    }
                    true
                })
                .map_err(map_curl_error)?;
            transfer
                .write_function(|data| {
                    let status = parse_http_status(&lines.borrow()).unwrap_or(0);
                    if deliver(status) == Flow::Stop
                        || sink.borrow_mut().on_data(data) == Flow::Stop
                    {
                        stopped.set(true);
                        return Ok(0);
                    }
                    Ok(data.len())
                })
                .map_err(map_curl_error)?;
            transfer
                .progress_function(|_, _, _, _| {
                    if sink.borrow_mut().on_idle() == Flow::Stop {
                        stopped.set(true);
                        return false;
                    }
                    true
                })
                .map_err(map_curl_error)?;
            transfer.perform()
        };

        match result {
            Err(_) if stopped.get() => Ok(StreamEnd::Stopped),
            Err(e) => {
                // Let the sink see the headers of a response whose body broke
                // before any byte (it still owns the verdict on the status).
                if !delivered.get() && !lines.borrow().is_empty() {
                    let status = parse_http_status(&lines.borrow()).unwrap_or(0);
                    deliver(status);
                }
                Err(map_curl_error(e))
            }
            Ok(()) => {
                if !delivered.get() {
                    let status = easy.response_code().map_err(map_curl_error)?;
                    if deliver(status) == Flow::Stop {
                        return Ok(StreamEnd::Stopped);
                    }
                }
                Ok(StreamEnd::Eof)
            }
        }
    }
}

fn map_curl_error(e: curl::Error) -> TransportError {
    let msg = e.to_string();
    if e.is_operation_timedout() {
        TransportError::Timeout(msg)
    } else if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_ssl_connect_error()
    {
        TransportError::Connection(msg)
    } else if e.is_partial_file() {
        TransportError::PartialBody(msg)
    } else {
        TransportError::Other(msg)
    }
}
