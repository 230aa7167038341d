//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a 10 KiB resource under several endpoints that model real server
//! quirks. Each server instance keeps its own request log, so tests can run in
//! parallel.
//!
//! - `/regular`: 200; with a Range header it adds `Content-Range` and sends
//!   only that range (a 200 that still honours the range).
//! - `/no-content-length`: like `/regular`, without `Content-Length`.
//! - `/no-range`: ignores Range, always the full body.
//! - `/no-range-no-content-length`: ignores Range, no `Content-Length`.
//! - `/resume`: without Range, declares the full length but closes after
//!   1024 bytes; Range requests get a proper 206.
//! - `/resume-length-mismatch`: the first plain GET is cut at 1024 bytes;
//!   Range requests answer for an 8 KiB resource; later plain GETs are full.
//! - `/range-aware`: strict 206 / 416 semantics, stable ETag.
//! - `/stall`: without Range, declares the full length, sends 1024 bytes and
//!   then keeps the connection open and silent; Range requests get a 206.
//! - `/missing`: 404.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const TEST_SIZE: usize = 10 * 1024;
const MISMATCH_SIZE: usize = 8 * 1024;
/// How long `/stall` stays silent before closing.
pub const STALL_FOR: Duration = Duration::from_secs(6);

/// Body served by every endpoint: position-dependent so offset bugs show up.
pub fn body() -> Vec<u8> {
    (0..TEST_SIZE).map(|i| (i % 251) as u8).collect()
}

#[derive(Default)]
struct ServerState {
    requests: AtomicUsize,
    ranges: Mutex<Vec<(String, Option<String>)>>,
    mismatch_injected: AtomicBool,
}

/// Handle to a running server. It lives until the process exits.
#[derive(Clone)]
pub struct TestServer {
    base: String,
    state: Arc<ServerState>,
}

impl TestServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(ServerState::default());
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        TestServer {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base, endpoint)
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// `Range` header of every request to `endpoint`, in order.
    pub fn ranges(&self, endpoint: &str) -> Vec<Option<String>> {
        let path = format!("/{}", endpoint);
        self.state
            .ranges
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == path)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

fn handle(mut stream: TcpStream, state: &ServerState) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(head) = read_head(&mut stream) else {
        return;
    };
    let (path, range_header) = parse_request(&head);
    state.requests.fetch_add(1, Ordering::SeqCst);
    state
        .ranges
        .lock()
        .unwrap()
        .push((path.clone(), range_header.clone()));
    let range = range_header.as_deref().and_then(parse_range);

    let data = body();
    let response = match path.as_str() {
        "/regular" => serve(&data, range, true, true),
        "/no-content-length" => serve(&data, range, true, false),
        "/no-range" => serve(&data, range, false, true),
        "/no-range-no-content-length" => serve(&data, range, false, false),
        "/resume" => match range {
            Some(r) => serve_range(&data, r, TEST_SIZE),
            None => serve_too_short(&data, 1024),
        },
        "/resume-length-mismatch" => match range {
            Some(r) => serve_range(&data, r, MISMATCH_SIZE),
            None if state.mismatch_injected.swap(true, Ordering::SeqCst) => {
                serve(&data, None, true, true)
            }
            None => serve_too_short(&data, 1024),
        },
        "/range-aware" => serve_strict(&data, range),
        "/stall" => match range {
            Some(r) => serve_range(&data, r, TEST_SIZE),
            None => serve_too_short(&data, 1024),
        },
        _ => Response::status("404 Not Found"),
    };
    let _ = stream.write_all(&response.head());
    let _ = stream.write_all(&response.body);
    let _ = stream.flush();
    if path == "/stall" && range.is_none() {
        thread::sleep(STALL_FOR);
    }
    let _ = stream.shutdown(std::net::Shutdown::Write);
}

struct Response {
    status: &'static str,
    headers: Vec<String>,
    body: Vec<u8>,
}

impl Response {
    fn status(status: &'static str) -> Self {
        Response {
            status,
            headers: vec!["Content-Length: 0".into()],
            body: Vec::new(),
        }
    }

    fn head(&self) -> Vec<u8> {
        let mut s = format!("HTTP/1.1 {}\r\nContent-Type: video/mp4\r\nConnection: close\r\n", self.status);
        for h in &self.headers {
            s.push_str(h);
            s.push_str("\r\n");
        }
        s.push_str("\r\n");
        s.into_bytes()
    }
}

/// Inclusive (start, end) of `bytes=a-b` / `bytes=a-`, end `None` when open.
fn parse_range(value: &str) -> Option<(usize, Option<usize>)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (a, b) = spec.split_once('-')?;
    let start = a.trim().parse().ok()?;
    let end = match b.trim() {
        "" => None,
        e => Some(e.parse().ok()?),
    };
    Some((start, end))
}

fn serve(
    data: &[u8],
    range: Option<(usize, Option<usize>)>,
    honour_range: bool,
    content_length: bool,
) -> Response {
    let mut headers = Vec::new();
    let slice = match range.filter(|_| honour_range) {
        Some((start, end)) => {
            let end = end.unwrap_or(data.len() - 1).min(data.len() - 1);
            headers.push(format!("Content-Range: bytes {}-{}/{}", start, end, data.len()));
            &data[start.min(end + 1)..=end]
        }
        None => data,
    };
    if content_length {
        headers.push(format!("Content-Length: {}", slice.len()));
    }
    Response {
        status: "200 OK",
        headers,
        body: slice.to_vec(),
    }
}

fn serve_too_short(data: &[u8], sent: usize) -> Response {
    Response {
        status: "200 OK",
        headers: vec![format!("Content-Length: {}", data.len())],
        body: data[..sent].to_vec(),
    }
}

fn serve_range(data: &[u8], (start, end): (usize, Option<usize>), total: usize) -> Response {
    let end = end.unwrap_or(total - 1).min(total - 1);
    let slice = &data[start.min(end + 1)..=end];
    Response {
        status: "206 Partial Content",
        headers: vec![
            format!("Content-Range: bytes {}-{}/{}", start, end, total),
            format!("Content-Length: {}", slice.len()),
        ],
        body: slice.to_vec(),
    }
}

fn serve_strict(data: &[u8], range: Option<(usize, Option<usize>)>) -> Response {
    let total = data.len();
    let mut resp = match range {
        None => Response {
            status: "200 OK",
            headers: vec![format!("Content-Length: {}", total)],
            body: data.to_vec(),
        },
        Some((start, _)) if start >= total => Response {
            status: "416 Range Not Satisfiable",
            headers: vec![
                format!("Content-Range: bytes */{}", total),
                "Content-Length: 0".into(),
            ],
            body: Vec::new(),
        },
        Some(r) => serve_range(data, r, total),
    };
    resp.headers.push("Accept-Ranges: bytes".into());
    resp.headers.push("ETag: \"rget-test-v1\"".into());
    resp
}

/// Read until the blank line that ends the request head.
fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > 64 * 1024 {
            return None;
        }
    }
    String::from_utf8(buf).ok()
}

/// Returns (path, Range header value).
fn parse_request(head: &str) -> (String, Option<String>) {
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let range = lines
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .map(|(_, v)| v.trim().to_string());
    (path, range)
}
