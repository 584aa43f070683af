use http::method::InvalidMethod;
use http::Method;
use may_minihttp::Request;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dispatcher::{Context, HeaderVec};

/// Build a [`Context`] from a `may_minihttp::Request`.
///
/// The body is read to the end here, inside the request's coroutine. A read
/// failure is logged and leaves the body empty.
///
/// # Errors
///
/// Returns `InvalidMethod` when the request line carries a method token that
/// is not valid HTTP.
pub fn parse_request(req: Request) -> Result<Context, InvalidMethod> {
    let method = req.method().to_string();
    let url = req.path().to_string();
    let headers = lowercase_headers(req.headers().iter().map(|h| (h.name, h.value)));

    let mut body = Vec::new();
    if let Err(err) = req.body().read_to_end(&mut body) {
        warn!(method = %method, url = %url, error = %err, "Request body read failed");
        body.clear();
    }

    context_from_parts(&method, &url, headers, body)
}

/// Collect raw header pairs with lowercase names and lossily decoded values.
pub fn lowercase_headers<'a, I>(raw: I) -> HeaderVec
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    raw.into_iter()
        .map(|(name, value)| {
            (
                Arc::from(name.to_ascii_lowercase()),
                String::from_utf8_lossy(value).into_owned(),
            )
        })
        .collect()
}

/// Validate the method token and build the context.
///
/// # Errors
///
/// Returns `InvalidMethod` for a malformed method token.
pub fn context_from_parts(
    method: &str,
    url: &str,
    headers: HeaderVec,
    body: Vec<u8>,
) -> Result<Context, InvalidMethod> {
    let method = Method::from_bytes(method.as_bytes())?;
    let header_count = headers.len();
    let body_len = body.len();
    let ctx = Context::new(method, url, headers, body);
    debug!(
        request_id = %ctx.request_id,
        method = %ctx.method(),
        path = %ctx.path(),
        header_count,
        body_len,
        "HTTP request parsed"
    );
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_headers() {
        let raw: Vec<(&str, &[u8])> = vec![
            ("Content-Type", b"application/json".as_slice()),
            ("X-Custom", b"v\xff".as_slice()),
        ];
        let headers = lowercase_headers(raw);
        assert_eq!(headers[0].0.as_ref(), "content-type");
        assert_eq!(headers[0].1, "application/json");
        assert_eq!(headers[1].0.as_ref(), "x-custom");
        assert_eq!(headers[1].1, "v\u{fffd}");
    }

    #[test]
    fn test_context_from_parts() {
        let headers = lowercase_headers(vec![("Cookie", b"sid=1".as_slice())]);
        let ctx = context_from_parts("PATCH", "/items/3?dry=1", headers, b"{}".to_vec()).unwrap();
        assert_eq!(*ctx.method(), Method::PATCH);
        assert_eq!(ctx.path(), "/items/3");
        assert_eq!(ctx.query_param("dry"), Some("1"));
        assert_eq!(ctx.cookie("sid"), Some("1"));
        assert_eq!(ctx.raw_body(), b"{}");
    }

    #[test]
    fn test_invalid_method_rejected() {
        assert!(context_from_parts("GE T", "/", HeaderVec::new(), Vec::new()).is_err());
    }
}
