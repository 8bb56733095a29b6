//! Per-call request options threaded through the handler chain.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use url::Url;

use crate::session::LoginRequest;

/// Hook that may rewrite the login request, or veto it by returning `None`.
pub type LoginHook = Arc<dyn Fn(LoginRequest) -> Option<LoginRequest> + Send + Sync>;

/// Authentication scheme requested for a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// Cookie session authentication.
    Cookie,
    /// Any other scheme; left to other middleware.
    Other(String),
}

impl FromStr for AuthScheme {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "cookie" => Self::Cookie,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Options that only the cookie session layer reads. Consumed by the first
/// session that sees them.
#[derive(Clone, Default)]
pub struct AuthCookieOptions {
    /// Runs before the login call is sent.
    pub on_before_login: Option<LoginHook>,
}

impl AuthCookieOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a login hook.
    #[must_use]
    pub fn on_before_login<F>(mut self, hook: F) -> Self
    where
        F: Fn(LoginRequest) -> Option<LoginRequest> + Send + Sync + 'static,
    {
        self.on_before_login = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for AuthCookieOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCookieOptions")
            .field("on_before_login", &self.on_before_login.is_some())
            .finish()
    }
}

/// Request-scoped options passed alongside each request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Authentication scheme opt-in.
    pub auth: Option<AuthScheme>,
    /// Base URI; cookie scoping context and base for a relative login URI.
    pub base_uri: Option<Url>,
    /// Verbose logging for the login call.
    pub debug: bool,
    /// Cookie-session specific options.
    pub auth_cookie: Option<AuthCookieOptions>,
}

impl RequestOptions {
    /// Creates options with nothing set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options that opt into cookie authentication.
    #[must_use]
    pub fn cookie_auth() -> Self {
        Self::new().with_auth(AuthScheme::Cookie)
    }

    /// Sets the authentication scheme.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the base URI.
    #[must_use]
    pub fn with_base_uri(mut self, base_uri: Url) -> Self {
        self.base_uri = Some(base_uri);
        self
    }

    /// Enables or disables verbose login logging.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets cookie-session options.
    #[must_use]
    pub fn with_auth_cookie(mut self, auth_cookie: AuthCookieOptions) -> Self {
        self.auth_cookie = Some(auth_cookie);
        self
    }

    /// Returns true if the call opted into cookie authentication.
    #[must_use]
    pub fn wants_cookie_auth(&self) -> bool {
        self.auth == Some(AuthScheme::Cookie)
    }
}
