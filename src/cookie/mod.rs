//! Cookie model, `Set-Cookie` parsing and request matching.
//!
//! A [`Cookie`] is keyed by (name, domain, path) inside a [`CookieJar`].
//! Matching follows RFC 6265 domain and path rules: a leading dot on the
//! domain is ignored, subdomains match unless the request host is an IP
//! address, and secure cookies are only sent over HTTPS.

mod jar;
mod seed;

pub use jar::CookieJar;
pub use seed::SeedCookies;
pub(crate) use seed::build_seeded_jar;

use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::debug;
use url::Url;

/// Characters a cookie name may not contain (besides controls and space).
const NAME_SEPARATORS: &[char] = &[
    '"', '(', ')', ',', '/', ':', ';', '<', '=', '>', '?', '@', '\\', '{', '}',
];

/// Errors produced while parsing or validating a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieParseError {
    /// The first `;`-separated segment has no `name=value` pair.
    #[error("cookie string has no name=value pair")]
    MissingNameValue,

    /// The cookie name is empty.
    #[error("cookie name is empty")]
    EmptyName,

    /// The cookie name contains a separator or control character.
    #[error("cookie name '{name}' contains invalid characters")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The cookie has no domain to scope it to.
    #[error("cookie '{name}' has no domain")]
    EmptyDomain {
        /// Name of the cookie without a domain.
        name: String,
    },
}

/// A single HTTP cookie held by a [`CookieJar`].
///
/// The value is redacted in Debug output so sessions can be traced without
/// leaking credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,
    /// Domain scope, possibly with a leading dot (e.g. `.example.org`).
    pub domain: String,
    /// Path scope (defaults to `/`).
    pub path: String,
    /// Expiry instant; `None` for session cookies.
    pub expires_at: Option<SystemTime>,
    /// Only send over HTTPS.
    pub secure: bool,
    /// Not exposed to client-side scripts.
    pub http_only: bool,
    value: String,
}

impl Cookie {
    /// Creates a session cookie scoped to `domain` and path `/`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            path: "/".to_string(),
            expires_at: None,
            secure: false,
            http_only: false,
            value: value.into(),
        }
    }

    /// Sets the path scope.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the expiry instant.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Marks the cookie as HTTPS-only.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Marks the cookie as hidden from scripts.
    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive; avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Parses a `Set-Cookie` header value (or a seed cookie string).
    ///
    /// Relative `Max-Age` values are anchored at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`CookieParseError::MissingNameValue`] when the leading segment
    /// has no `=`, or [`CookieParseError::EmptyName`] when the name is blank.
    pub fn parse(input: &str) -> Result<Self, CookieParseError> {
        Self::parse_at(input, SystemTime::now())
    }

    /// Parses a `Set-Cookie` value, anchoring `Max-Age` at `now`.
    ///
    /// `Max-Age` takes precedence over `Expires` and a non-positive `Max-Age`
    /// expires the cookie at once (RFC 6265; Guzzle-style jars prefer
    /// `Expires` and ignore `Max-Age=0`). The value is kept verbatim apart
    /// from surrounding whitespace, quotes included. Unknown attributes are
    /// ignored, as are `Expires` values that are not a recognizable HTTP date.
    /// A missing `Path` defaults to `/`; a missing `Domain` is left empty for
    /// the caller to fill in from the request.
    ///
    /// # Errors
    ///
    /// See [`Cookie::parse`].
    pub fn parse_at(input: &str, now: SystemTime) -> Result<Self, CookieParseError> {
        let mut segments = input.split(';');
        let pair = segments.next().unwrap_or_default();
        let (name, value) = pair
            .split_once('=')
            .ok_or(CookieParseError::MissingNameValue)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CookieParseError::EmptyName);
        }

        let mut cookie = Self::new(name, value.trim(), "");
        let mut max_age: Option<i64> = None;

        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, attr_value) = match segment.split_once('=') {
                Some((key, attr_value)) => (key.trim(), Some(attr_value.trim())),
                None => (segment, None),
            };

            match (key.to_ascii_lowercase().as_str(), attr_value) {
                ("domain", Some(domain)) => cookie.domain = domain.to_string(),
                ("path", Some(path)) => cookie.path = path.to_string(),
                ("expires", Some(raw)) => match parse_cookie_date(raw) {
                    Some(instant) => cookie.expires_at = Some(instant),
                    None => debug!(name = %cookie.name, expires = raw, "ignoring unparseable Expires"),
                },
                ("max-age", Some(raw)) => match raw.parse::<i64>() {
                    Ok(seconds) => max_age = Some(seconds),
                    Err(_) => debug!(name = %cookie.name, max_age = raw, "ignoring invalid Max-Age"),
                },
                ("secure", _) => cookie.secure = true,
                ("httponly", _) => cookie.http_only = true,
                _ => {}
            }
        }

        if let Some(seconds) = max_age {
            cookie.expires_at = Some(match u64::try_from(seconds) {
                Ok(seconds) if seconds > 0 => now
                    .checked_add(Duration::from_secs(seconds))
                    .unwrap_or(now),
                // Zero or negative Max-Age means "expire immediately".
                _ => UNIX_EPOCH,
            });
        }

        Ok(cookie)
    }

    /// Checks that the cookie can be stored in a jar.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or malformed name, or an empty domain.
    pub fn validate(&self) -> Result<(), CookieParseError> {
        if self.name.is_empty() {
            return Err(CookieParseError::EmptyName);
        }
        if self
            .name
            .chars()
            .any(|c| c.is_ascii_control() || c == ' ' || NAME_SEPARATORS.contains(&c))
        {
            return Err(CookieParseError::InvalidName {
                name: self.name.clone(),
            });
        }
        if self.domain.trim_start_matches('.').is_empty() {
            return Err(CookieParseError::EmptyDomain {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Returns true once `now` is past the expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Returns true when the cookie has no expiry (lives for the session).
    #[must_use]
    pub fn is_session_cookie(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Returns true if both cookies share the (name, domain, path) key.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// Domain match per RFC 6265 §5.1.3.
    #[must_use]
    pub fn matches_domain(&self, host: &str) -> bool {
        let cookie_domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let host = host.to_ascii_lowercase();

        if cookie_domain.is_empty() || host == cookie_domain {
            return true;
        }
        if is_ip_host(&host) {
            return false;
        }
        host.strip_suffix(&cookie_domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// Path match per RFC 6265 §5.1.4.
    #[must_use]
    pub fn matches_path(&self, request_path: &str) -> bool {
        let cookie_path = self.path.as_str();
        if cookie_path == "/" || cookie_path == request_path {
            return true;
        }
        let Some(rest) = request_path.strip_prefix(cookie_path) else {
            return false;
        };
        cookie_path.ends_with('/') || rest.starts_with('/')
    }

    /// Returns true if the cookie should be sent with a request to `url`,
    /// ignoring expiry.
    #[must_use]
    pub fn matches_url(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        self.matches_domain(host) && self.matches_path(url.path())
    }

    /// Renders the cookie in `Set-Cookie` form.
    #[must_use]
    pub fn to_set_cookie_string(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];
        if !self.domain.is_empty() {
            parts.push(format!("Domain={}", self.domain));
        }
        parts.push(format!("Path={}", self.path));
        if let Some(expires_at) = self.expires_at {
            parts.push(format!("Expires={}", httpdate::fmt_http_date(expires_at)));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        parts.join("; ")
    }
}

// Custom Debug impl that redacts the cookie value.
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires_at", &self.expires_at)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .finish()
    }
}

fn is_ip_host(host: &str) -> bool {
    host.starts_with('[') || host.parse::<IpAddr>().is_ok()
}

/// Parses an `Expires` attribute.
///
/// Accepts the three RFC 7231 formats plus the dashed Netscape form
/// (`Wed, 21-Oct-2026 07:28:00 GMT`).
fn parse_cookie_date(raw: &str) -> Option<SystemTime> {
    let raw = raw.trim();
    if let Ok(instant) = httpdate::parse_http_date(raw) {
        return Some(instant);
    }
    httpdate::parse_http_date(&raw.replace('-', " ")).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_set_cookie_with_attributes() {
        let cookie = Cookie::parse(
            "sessionToken=abc123; Domain=.example.org; Path=/app; Secure; HttpOnly",
        )
        .unwrap();
        assert_eq!(cookie.name, "sessionToken");
        assert_eq!(cookie.value(), "abc123");
        assert_eq!(cookie.domain, ".example.org");
        assert_eq!(cookie.path, "/app");
        assert!(cookie.secure);
        assert!(cookie.http_only);
        assert!(cookie.is_session_cookie());
    }

    #[test]
    fn test_parse_defaults_path_and_leaves_domain_empty() {
        let cookie = Cookie::parse("id=1").unwrap();
        assert_eq!(cookie.path, "/");
        assert!(cookie.domain.is_empty());
        assert!(cookie.validate().is_err(), "domainless cookie must not validate");
    }

    #[test]
    fn test_parse_keeps_quotes_in_value() {
        let cookie = Cookie::parse("token=\"quoted value\" ; Domain=example.org").unwrap();
        assert_eq!(cookie.value(), "\"quoted value\"");
    }

    #[test]
    fn test_validate_accepts_bracketed_name() {
        let cookie = Cookie::parse("remember[token]=xyz; Domain=example.org").unwrap();
        assert_eq!(cookie.name, "remember[token]");
        assert!(cookie.validate().is_ok());
    }

    #[test]
    fn test_parse_expires_formats() {
        let imf = Cookie::parse("a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT").unwrap();
        let dashed = Cookie::parse("a=1; Expires=Wed, 21-Oct-2026 07:28:00 GMT").unwrap();
        assert!(imf.expires_at.is_some());
        assert_eq!(imf.expires_at, dashed.expires_at);
    }

    #[test]
    fn test_parse_ignores_garbage_expires() {
        let cookie = Cookie::parse("a=1; Expires=next tuesday").unwrap();
        assert!(cookie.is_session_cookie());
    }

    #[test]
    fn test_max_age_takes_precedence_over_expires() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000_000);
        let cookie =
            Cookie::parse_at("a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=60", now)
                .unwrap();
        assert_eq!(cookie.expires_at, Some(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_non_positive_max_age_expires_immediately() {
        let now = SystemTime::now();
        let cookie = Cookie::parse_at("a=1; Max-Age=0", now).unwrap();
        assert!(cookie.is_expired_at(now));
    }

    #[test]
    fn test_parse_rejects_missing_pair_and_empty_name() {
        assert_eq!(
            Cookie::parse("justaname").unwrap_err(),
            CookieParseError::MissingNameValue
        );
        assert_eq!(
            Cookie::parse("=value; Path=/").unwrap_err(),
            CookieParseError::EmptyName
        );
    }

    #[test]
    fn test_validate_rejects_separator_in_name() {
        let cookie = Cookie::new("bad name", "v", "example.org");
        assert!(matches!(
            cookie.validate(),
            Err(CookieParseError::InvalidName { .. })
        ));
        assert!(Cookie::new("good", "v", "example.org").validate().is_ok());
    }

    #[test]
    fn test_domain_matching() {
        let cookie = Cookie::new("a", "1", ".example.org");
        assert!(cookie.matches_domain("example.org"));
        assert!(cookie.matches_domain("api.example.org"));
        assert!(cookie.matches_domain("API.Example.org"));
        assert!(!cookie.matches_domain("badexample.org"));
        assert!(!cookie.matches_domain("other.com"));
    }

    #[test]
    fn test_ip_hosts_only_match_exactly() {
        let cookie = Cookie::new("a", "1", "0.0.1");
        assert!(!cookie.matches_domain("127.0.0.1"));
        let exact = Cookie::new("a", "1", "127.0.0.1");
        assert!(exact.matches_domain("127.0.0.1"));
    }

    #[test]
    fn test_path_matching() {
        let cookie = Cookie::new("a", "1", "example.org").with_path("/docs");
        assert!(cookie.matches_path("/docs"));
        assert!(cookie.matches_path("/docs/page"));
        assert!(!cookie.matches_path("/docsearch"));
        assert!(!cookie.matches_path("/"));

        let trailing = Cookie::new("a", "1", "example.org").with_path("/docs/");
        assert!(trailing.matches_path("/docs/page"));
    }

    #[test]
    fn test_secure_cookie_requires_https() {
        let cookie = Cookie::new("a", "1", "example.org").with_secure(true);
        assert!(cookie.matches_url(&url("https://example.org/")));
        assert!(!cookie.matches_url(&url("http://example.org/")));
    }

    #[test]
    fn test_expiry_boundary() {
        let expires_at = UNIX_EPOCH + Duration::from_secs(100);
        let cookie = Cookie::new("a", "1", "example.org").with_expires_at(expires_at);
        assert!(!cookie.is_expired_at(expires_at));
        assert!(cookie.is_expired_at(expires_at + Duration::from_secs(1)));
    }

    #[test]
    fn test_set_cookie_string_round_trips_through_parse() {
        let expires_at = UNIX_EPOCH + Duration::from_secs(2_000_000_000);
        let cookie = Cookie::new("sessionToken", "abc123", ".example.org")
            .with_expires_at(expires_at)
            .with_secure(true);
        let rendered = cookie.to_set_cookie_string();
        assert!(rendered.starts_with("sessionToken=abc123; Domain=.example.org; Path=/"));
        assert_eq!(Cookie::parse(&rendered).unwrap(), cookie);
    }

    #[test]
    fn test_cookie_debug_redacts_value() {
        let cookie = Cookie::new("session", "super_secret_token", "example.org");
        let debug_str = format!("{cookie:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(
            !debug_str.contains("super_secret_token"),
            "Debug output must NOT contain the actual value"
        );
    }
}
