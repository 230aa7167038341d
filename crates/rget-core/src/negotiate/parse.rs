//! Parse HTTP response header lines into the fields the negotiator needs.

use super::ContentRange;

/// Fields collected from one response's header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ParsedHeaders {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    pub content_range: Option<ContentRange>,
    pub accept_ranges: Option<bool>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Status code from the last `HTTP/x y` line (earlier ones belong to redirects
/// or interim responses).
pub(crate) fn parse_http_status(lines: &[String]) -> Option<u32> {
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("HTTP/"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
}

/// Parse collected header lines. Only lines after the last status line count.
pub(crate) fn parse_headers(lines: &[String]) -> ParsedHeaders {
    let start = lines
        .iter()
        .rposition(|l| l.starts_with("HTTP/"))
        .unwrap_or(0);
    let mut out = ParsedHeaders {
        status: parse_http_status(lines),
        ..ParsedHeaders::default()
    };

    for line in &lines[start..] {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                out.content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("content-range") {
                out.content_range = parse_content_range(value);
            } else if name.eq_ignore_ascii_case("accept-ranges") {
                out.accept_ranges = Some(value.eq_ignore_ascii_case("bytes"));
            } else if name.eq_ignore_ascii_case("etag") {
                out.etag = Some(value.trim_matches('"').to_string());
            } else if name.eq_ignore_ascii_case("last-modified") {
                out.last_modified = Some(value.to_string());
            }
        }
    }
    out
}

/// Parse a `Content-Range` value: `bytes a-b/total`, `bytes a-b/*` or `bytes */total`.
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let value = value.trim();
    let rest = value
        .get(..6)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes "))
        .map(|_| value[6..].trim())?;
    let (range, total) = rest.split_once('/')?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse::<u64>().ok()?),
    };
    let range = range.trim();
    if range == "*" {
        return total.map(|total| ContentRange::Unsatisfied { total });
    }
    let (first, last) = range.split_once('-')?;
    Some(ContentRange::Bytes {
        first: first.trim().parse().ok()?,
        last: last.trim().parse().ok()?,
        total,
    })
}
