//! Cookie parsing and `Set-Cookie` construction.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use super::core::HeaderVec;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        })
    }
}

/// Optional attributes for [`Context::set_cookie`](super::Context::set_cookie).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub expires: Option<DateTime<Utc>>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    #[must_use]
    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// Parse a `Cookie` request header into name/value pairs.
///
/// Values are percent-decoded. Pairs without `=`, or with an empty name or
/// value, are skipped. A value that fails to decode is kept as sent.
#[must_use]
pub fn parse_cookies(header: Option<&str>) -> HeaderVec {
    let mut cookies = HeaderVec::new();
    let Some(header) = header else {
        return cookies;
    };
    for pair in header.split(';') {
        // Split on the first `=` only: `token=a=b` keeps `a=b` as the value.
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            continue;
        }
        let decoded = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        cookies.push((Arc::from(name), decoded));
    }
    cookies
}

/// Build a `Set-Cookie` header value.
///
/// The value is percent-encoded. Attributes follow in the order `Expires`,
/// `Path`, `Domain`, `Secure`, `HttpOnly`, `SameSite`.
#[must_use]
pub fn serialize_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    SetCookie {
        name,
        value,
        options,
    }
    .to_string()
}

struct SetCookie<'a> {
    name: &'a str,
    value: &'a str,
    options: &'a CookieOptions,
}

impl fmt::Display for SetCookie<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, urlencoding::encode(self.value))?;
        let options = self.options;
        if let Some(expires) = options.expires {
            write!(f, "; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT"))?;
        }
        if let Some(path) = &options.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &options.domain {
            write!(f, "; Domain={domain}")?;
        }
        if options.secure {
            f.write_str("; Secure")?;
        }
        if options.http_only {
            f.write_str("; HttpOnly")?;
        }
        if let Some(same_site) = options.same_site {
            write!(f, "; SameSite={same_site}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn get<'a>(cookies: &'a HeaderVec, name: &str) -> Option<&'a str> {
        cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_parse_basic() {
        let cookies = parse_cookies(Some("session=abc123; theme=dark"));
        assert_eq!(cookies.len(), 2);
        assert_eq!(get(&cookies, "session"), Some("abc123"));
        assert_eq!(get(&cookies, "theme"), Some("dark"));
    }

    #[test]
    fn test_parse_decodes_and_skips_malformed() {
        let cookies = parse_cookies(Some("name=John%20Doe; flag; =orphan; empty=; token=a=b"));
        assert_eq!(get(&cookies, "name"), Some("John Doe"));
        assert_eq!(get(&cookies, "flag"), None);
        assert_eq!(get(&cookies, "empty"), None);
        assert_eq!(get(&cookies, "token"), Some("a=b"));
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn test_parse_missing_header() {
        assert!(parse_cookies(None).is_empty());
        assert!(parse_cookies(Some("")).is_empty());
    }

    #[test]
    fn test_serialize_plain() {
        assert_eq!(
            serialize_cookie("greeting", "hello world", &CookieOptions::default()),
            "greeting=hello%20world"
        );
    }

    #[test]
    fn test_serialize_attribute_order() {
        let expires = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        let options = CookieOptions::new()
            .same_site(SameSite::Lax)
            .http_only()
            .secure()
            .domain("example.com")
            .path("/")
            .expires(expires);

        assert_eq!(
            serialize_cookie("sid", "42", &options),
            "sid=42; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Path=/; Domain=example.com; \
             Secure; HttpOnly; SameSite=Lax"
        );
    }
}
