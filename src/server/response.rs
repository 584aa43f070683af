use http::StatusCode;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::dispatcher::{HandlerResponse, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};

/// `may_minihttp` stores at most this many headers per response.
pub const MAX_RESPONSE_HEADERS: usize = 16;

/// Upper bound on distinct interned header lines.
pub const MAX_INTERNED_HEADER_LINES: usize = 16_384;

/// `may_minihttp` takes header lines as `&'static str`. Lines are interned so
/// each distinct line is allocated once for the life of the process.
static HEADER_LINES: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(Default::default);

fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}

/// Render `name: value` as a `'static` header line.
///
/// Returns `None` for names containing CR, LF or `:`, for values containing
/// CR or LF, and for new lines once the interner is full.
fn header_line(name: &str, value: &str) -> Option<&'static str> {
    if name.contains(['\r', '\n', ':']) || value.contains(['\r', '\n']) {
        return None;
    }
    if name.eq_ignore_ascii_case("content-type") {
        match value {
            JSON_CONTENT_TYPE => return Some("Content-Type: application/json"),
            TEXT_CONTENT_TYPE => return Some("Content-Type: text/plain"),
            _ => {}
        }
    }

    let line = format!("{name}: {value}");
    let mut lines = HEADER_LINES.lock().unwrap_or_else(PoisonError::into_inner);
    intern(&mut lines, line, MAX_INTERNED_HEADER_LINES)
}

fn intern(
    lines: &mut HashSet<&'static str>,
    line: String,
    capacity: usize,
) -> Option<&'static str> {
    if let Some(existing) = lines.get(line.as_str()) {
        return Some(existing);
    }
    if lines.len() >= capacity {
        return None;
    }
    let leaked: &'static str = Box::leak(line.into_boxed_str());
    lines.insert(leaked);
    Some(leaked)
}

/// Write a finalized response; a missing status means 200.
pub fn write_handler_response(res: &mut Response, response: HandlerResponse) {
    let status = response.status_or_default();
    res.status_code(usize::from(status), status_reason(status));

    let mut written = 0;
    for (name, value) in &response.headers {
        if written == MAX_RESPONSE_HEADERS {
            warn!(header = %name, "Response header limit reached; header dropped");
            continue;
        }
        match header_line(name, value) {
            Some(line) => {
                res.header(line);
                written += 1;
            }
            None => warn!(header = %name, "Header dropped: invalid characters or interner full"),
        }
    }
    res.body_vec(response.body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(302), "Found");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(500), "Internal Server Error");
        assert_eq!(status_reason(299), "Unknown");
    }

    #[test]
    fn test_header_line_fast_path_and_interning() {
        assert_eq!(
            header_line("content-type", "application/json"),
            Some("Content-Type: application/json")
        );
        let first = header_line("location", "/next").unwrap();
        let second = header_line("location", "/next").unwrap();
        assert_eq!(first, "location: /next");
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_header_line_rejects_injection() {
        assert_eq!(header_line("x-evil", "a\r\nSet-Cookie: x=1"), None);
        assert_eq!(header_line("bad\nname", "v"), None);
        assert_eq!(header_line("x-a:b", "v"), None);
    }

    #[test]
    fn test_intern_stops_growing_at_capacity() {
        let mut lines = HashSet::new();
        let a = intern(&mut lines, "x-a: 1".to_string(), 2).unwrap();
        intern(&mut lines, "x-b: 2".to_string(), 2).unwrap();

        assert_eq!(intern(&mut lines, "x-c: 3".to_string(), 2), None);
        assert_eq!(lines.len(), 2);
        let again = intern(&mut lines, "x-a: 1".to_string(), 2).unwrap();
        assert!(std::ptr::eq(a, again));
    }
}
