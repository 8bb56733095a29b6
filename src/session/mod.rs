//! Cookie session middleware.
//!
//! [`CookieSession`] holds a cookie jar and a login configuration. Requests
//! that opt in with `auth = cookie` get a login performed lazily before the
//! first send, the jar's cookies attached, and any `Set-Cookie` on the
//! response absorbed back into the jar.
//!
//! # Example
//!
//! ```no_run
//! use cookie_session::{CookieSession, LoginConfig, Pipeline, ReqwestTransport, RequestOptions};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = CookieSession::new(
//!     LoginConfig::new("https://example.org/login", json!({"user": "john", "password": "pass"})),
//!     None,
//! );
//! let pipeline = Pipeline::new(ReqwestTransport::default()).with(session);
//!
//! let request = reqwest::Request::new(reqwest::Method::GET, "https://example.org/account".parse()?);
//! let response = pipeline.send(request, RequestOptions::cookie_auth()).await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

mod config;
mod login;

pub use config::{
    CONNECT_TIMEOUT_SECS, ConfigError, LoginClientSettings, LoginConfig, LoginMethod,
    READ_TIMEOUT_SECS,
};
pub use login::LoginRequest;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderValue};
use reqwest::{Request, Response};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::cookie::{CookieJar, SeedCookies, build_seeded_jar};
use crate::error::SessionError;
use crate::middleware::{AuthCookieOptions, Handler, Middleware, RequestOptions};

/// Lifecycle of a session. There is no way back to `Fresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No login has completed and no seed cookies were parsed.
    Fresh,
    /// A login completed, or the session was seeded with cookies.
    SessionEstablished,
}

/// Login-driven cookie authentication layer.
///
/// Cloning is cheap and clones share the jar and session state.
#[derive(Clone)]
pub struct CookieSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: LoginConfig,
    settings: LoginClientSettings,
    jar: Arc<CookieJar>,
    login_completed: AtomicBool,
    // Serializes login attempts so concurrent callers don't log in twice.
    login_gate: Mutex<()>,
}

impl CookieSession {
    /// Creates a session with default login client settings.
    ///
    /// See [`SeedCookies`] for how `seed` is interpreted. The session starts
    /// established iff a fresh jar was built and ended up non-empty.
    #[must_use]
    pub fn new(config: LoginConfig, seed: Option<SeedCookies>) -> Self {
        Self::with_settings(config, seed, LoginClientSettings::default())
    }

    /// Creates a session with explicit login client settings.
    #[must_use]
    pub fn with_settings(
        config: LoginConfig,
        seed: Option<SeedCookies>,
        settings: LoginClientSettings,
    ) -> Self {
        let (jar, established) = build_seeded_jar(seed);
        debug!(
            cookies = jar.len(),
            established,
            login = ?config,
            "cookie session created"
        );
        Self {
            inner: Arc::new(SessionInner {
                config,
                settings,
                jar,
                login_completed: AtomicBool::new(established),
                login_gate: Mutex::new(()),
            }),
        }
    }

    /// The login configuration.
    #[must_use]
    pub fn config(&self) -> &LoginConfig {
        &self.inner.config
    }

    /// A handle to the shared cookie jar.
    #[must_use]
    pub fn cookie_jar(&self) -> Arc<CookieJar> {
        Arc::clone(&self.inner.jar)
    }

    /// Returns true once a login completed or seed cookies were parsed.
    #[must_use]
    pub fn login_completed(&self) -> bool {
        self.inner.login_completed.load(Ordering::Acquire)
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.login_completed() {
            SessionState::SessionEstablished
        } else {
            SessionState::Fresh
        }
    }

    fn needs_login(&self) -> bool {
        self.inner.jar.is_empty() || !self.login_completed()
    }

    /// Logs in if the jar is empty or no login has completed yet.
    ///
    /// Returns `options` with the cookie-session options taken out, whichever
    /// branch ran.
    ///
    /// # Errors
    ///
    /// Propagates login failures unchanged; the session then stays `Fresh`
    /// and the next call tries again.
    #[instrument(level = "debug", skip_all)]
    pub async fn ensure_session(
        &self,
        mut options: RequestOptions,
    ) -> Result<RequestOptions, SessionError> {
        let auth_cookie = options.auth_cookie.take();

        if self.needs_login() {
            let _gate = self.inner.login_gate.lock().await;
            // Another caller may have finished logging in while we waited.
            if self.needs_login() {
                self.perform_login(auth_cookie.as_ref(), options.base_uri.as_ref(), options.debug)
                    .await?;
            }
        }

        Ok(options)
    }

    /// Runs [`ensure_session`](Self::ensure_session) and returns the jar.
    ///
    /// # Errors
    ///
    /// Same as [`ensure_session`](Self::ensure_session).
    pub async fn hydrated_jar(
        &self,
        options: RequestOptions,
    ) -> Result<(Arc<CookieJar>, RequestOptions), SessionError> {
        let options = self.ensure_session(options).await?;
        Ok((self.cookie_jar(), options))
    }

    async fn perform_login(
        &self,
        auth_cookie: Option<&AuthCookieOptions>,
        base_uri: Option<&Url>,
        debug: bool,
    ) -> Result<(), SessionError> {
        let mut login = LoginRequest::from_config(&self.inner.config, base_uri, debug)?;

        if let Some(hook) = auth_cookie.and_then(|o| o.on_before_login.as_ref()) {
            match hook(login) {
                Some(rewritten) => login = rewritten,
                None => {
                    debug!("login vetoed by on_before_login hook");
                    return Ok(());
                }
            }
        }

        let url = login.url.clone();
        let status =
            login::send_login(Arc::clone(&self.inner.jar), &self.inner.settings, login).await?;
        self.inner.login_completed.store(true, Ordering::Release);
        info!(
            url = %url,
            status = %status,
            cookies = self.inner.jar.len(),
            "login completed"
        );
        Ok(())
    }

    /// Sets the `Cookie` header to every live cookie matching the request URL.
    ///
    /// `options.base_uri` is scoping context only; the request destination
    /// never changes. An existing `Cookie` header is replaced, and left as is
    /// when no cookie matches.
    #[must_use]
    pub fn attach_cookies(&self, mut request: Request, options: &RequestOptions) -> Request {
        let header = self.inner.jar.header_value(request.url());
        debug!(
            url = %request.url(),
            base_uri = ?options.base_uri.as_ref().map(Url::as_str),
            attached = header.is_some(),
            "attaching cookies"
        );

        match header.map(|value| HeaderValue::from_str(&value)) {
            Some(Ok(value)) => {
                request.headers_mut().insert(COOKIE, value);
            }
            Some(Err(error)) => {
                warn!(error = %error, "cookie header is not a valid header value; not attached");
            }
            None => {}
        }
        request
    }

    /// Stores every `Set-Cookie` on `response`, scoped to `request_url`.
    ///
    /// The response is returned untouched.
    #[must_use]
    pub fn absorb_cookies(&self, request_url: &Url, response: Response) -> Response {
        let stored = self
            .inner
            .jar
            .extract_from_response(request_url, response.headers());
        if stored > 0 {
            debug!(stored, url = %request_url, "absorbed response cookies");
        }
        response
    }
}

impl std::fmt::Debug for CookieSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSession")
            .field("config", &self.inner.config)
            .field("cookies", &self.inner.jar.len())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Middleware for CookieSession {
    fn intercept(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(CookieAuthHandler {
            session: self.clone(),
            next,
        })
    }
}

/// Handler produced by [`CookieSession::intercept`].
struct CookieAuthHandler {
    session: CookieSession,
    next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for CookieAuthHandler {
    async fn handle(
        &self,
        request: Request,
        options: RequestOptions,
    ) -> Result<Response, SessionError> {
        if !options.wants_cookie_auth() {
            return self.next.handle(request, options).await;
        }

        let options = self.session.ensure_session(options).await?;
        let request = self.session.attach_cookies(request, &options);
        let sent_url = request.url().clone();
        let response = self.next.handle(request, options).await?;
        Ok(self.session.absorb_cookies(&sent_url, response))
    }
}
