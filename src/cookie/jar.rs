//! In-memory cookie jar shared between the session layer and reqwest.
//!
//! The jar implements [`reqwest::cookie::CookieStore`], so handing an
//! `Arc<CookieJar>` to `ClientBuilder::cookie_provider()` makes the client
//! harvest `Set-Cookie` headers into it on every response.

use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use tracing::{debug, instrument, warn};
use url::Url;

use super::Cookie;

/// A set of cookies keyed by (name, domain, path).
///
/// Interior mutability lets one `Arc<CookieJar>` be shared by the session,
/// the login client and any caller that supplied the jar. Coordinating
/// several sessions over one jar is left to the caller.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<Cookie>>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a cookie, replacing any entry with the same (name, domain, path).
    ///
    /// Returns `false` when nothing was stored: the cookie failed validation,
    /// or it carried an empty value, which deletes the matching entry instead.
    pub fn insert_or_replace(&self, cookie: Cookie) -> bool {
        if let Err(error) = cookie.validate() {
            debug!(name = %cookie.name, reason = %error, "rejecting cookie");
            return false;
        }

        let mut cookies = self.write();
        let existing = cookies.iter().position(|c| c.same_key(&cookie));

        if cookie.value().is_empty() {
            if let Some(index) = existing {
                debug!(name = %cookie.name, domain = %cookie.domain, "empty value clears cookie");
                cookies.remove(index);
            }
            return false;
        }

        debug!(
            name = %cookie.name,
            domain = %cookie.domain,
            path = %cookie.path,
            replaced = existing.is_some(),
            "storing cookie"
        );
        match existing {
            Some(index) => cookies[index] = cookie,
            None => cookies.push(cookie),
        }
        true
    }

    /// Returns the number of stored cookies, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns a snapshot of every stored cookie in insertion order.
    #[must_use]
    pub fn cookies(&self) -> Vec<Cookie> {
        self.read().clone()
    }

    /// Looks up a cookie by name, regardless of domain and path.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Cookie> {
        self.read().iter().find(|c| c.name == name).cloned()
    }

    /// Removes the entry with the given key. Returns true if one was removed.
    pub fn remove(&self, name: &str, domain: &str, path: &str) -> bool {
        let mut cookies = self.write();
        let before = cookies.len();
        cookies.retain(|c| !(c.name == name && c.domain == domain && c.path == path));
        cookies.len() != before
    }

    /// Removes every cookie.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Drops cookies that are expired at `now`.
    pub fn clear_expired(&self, now: SystemTime) {
        self.write().retain(|c| !c.is_expired_at(now));
    }

    /// Drops cookies without an expiry.
    pub fn clear_session_cookies(&self) {
        self.write().retain(|c| !c.is_session_cookie());
    }

    /// Serializes the cookies that apply to `url` into a `Cookie` header value.
    ///
    /// Returns `None` when no stored cookie matches.
    #[must_use]
    pub fn header_value(&self, url: &Url) -> Option<String> {
        self.header_value_at(url, SystemTime::now())
    }

    /// Like [`header_value`](Self::header_value) with an explicit clock.
    ///
    /// Expired cookies are never included.
    #[must_use]
    pub fn header_value_at(&self, url: &Url, now: SystemTime) -> Option<String> {
        let pairs: Vec<String> = self
            .read()
            .iter()
            .filter(|c| c.matches_url(url) && !c.is_expired_at(now))
            .map(|c| format!("{}={}", c.name, c.value()))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Stores every `Set-Cookie` header in `headers`, scoped to `url`.
    ///
    /// Returns how many cookies were stored.
    #[instrument(level = "debug", skip(self, headers), fields(url = %url))]
    pub fn extract_from_response(&self, url: &Url, headers: &HeaderMap) -> usize {
        let values = headers.get_all(SET_COOKIE).iter().filter_map(|value| {
            let parsed = value.to_str().ok();
            if parsed.is_none() {
                warn!("skipping non-ASCII Set-Cookie header");
            }
            parsed
        });
        self.store_set_cookies(url, values)
    }

    /// Parses raw `Set-Cookie` values and stores them, scoped to `url`.
    ///
    /// A missing domain defaults to the request host and a relative path is
    /// replaced by the request's directory. Cookies whose domain does
    /// not cover the request host are dropped.
    pub fn store_set_cookies<'a>(&self, url: &Url, values: impl Iterator<Item = &'a str>) -> usize {
        let Some(host) = url.host_str() else {
            warn!(url = %url, "cannot scope cookies to a URL without a host");
            return 0;
        };

        let mut stored = 0;
        for raw in values {
            let mut cookie = match Cookie::parse(raw) {
                Ok(cookie) => cookie,
                Err(error) => {
                    warn!(reason = %error, "skipping malformed Set-Cookie header");
                    continue;
                }
            };

            if cookie.domain.is_empty() {
                cookie.domain = host.to_string();
            }
            if !cookie.path.starts_with('/') {
                cookie.path = default_path(url).to_string();
            }
            if !cookie.matches_domain(host) {
                debug!(
                    name = %cookie.name,
                    domain = %cookie.domain,
                    host,
                    "dropping cookie for foreign domain"
                );
                continue;
            }

            if self.insert_or_replace(cookie) {
                stored += 1;
            }
        }
        stored
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Cookie>> {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Cookie>> {
        self.cookies.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let values = cookie_headers.filter_map(|value| value.to_str().ok());
        self.store_set_cookies(url, values);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self.header_value(url)?;
        HeaderValue::from_str(&header).ok()
    }
}

/// Default cookie path per RFC 6265 §5.1.4: the request path up to, but not
/// including, its last `/`.
fn default_path(url: &Url) -> &str {
    let path = url.path();
    if !path.starts_with('/') {
        return "/";
    }
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}
