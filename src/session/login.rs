//! Login request construction and the login round trip.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::cookie::CookieJar;
use crate::error::SessionError;

use super::config::{LoginClientSettings, LoginConfig, LoginMethod};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// A fully resolved login call, open to inspection and rewriting by a
/// login hook before it is sent.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// HTTP method (`GET` or `POST`).
    pub method: Method,
    /// Absolute login URL.
    pub url: Url,
    /// Extra request headers.
    pub headers: HeaderMap,
    /// Query parameters appended to `url`.
    pub query: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Vec<u8>>,
    /// Follow redirects on the login call (off by default).
    pub follow_redirects: bool,
    /// Verbose connection logging for this call.
    pub debug: bool,
}

impl LoginRequest {
    /// Builds the login call described by `config`.
    ///
    /// A relative login URI is resolved against `base_uri`. For GET logins
    /// the fields are appended to any query already in the configured URI
    /// rather than replacing it, unlike Guzzle's `query` option.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidLoginUrl`] when the URI cannot be made
    /// absolute, or [`SessionError::InvalidJsonFields`] if JSON encoding fails.
    pub fn from_config(
        config: &LoginConfig,
        base_uri: Option<&Url>,
        debug: bool,
    ) -> Result<Self, SessionError> {
        let url = resolve_login_url(config.uri(), base_uri)?;
        let mut request = Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            follow_redirects: false,
            debug,
        };

        match config.method() {
            LoginMethod::Post => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(field_pairs(config.fields()))
                    .finish();
                request.method = Method::POST;
                request
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
                request.body = Some(encoded.into_bytes());
            }
            LoginMethod::Json => {
                let body = serde_json::to_vec(config.fields())
                    .map_err(|source| SessionError::InvalidJsonFields { source })?;
                request.method = Method::POST;
                request
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                request.body = Some(body);
            }
            LoginMethod::Get => request.query = field_pairs(config.fields()),
        }

        Ok(request)
    }

    /// Returns the URL the call will hit, query included.
    #[must_use]
    pub fn target_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        url
    }
}

/// Sends the login call through a client whose cookie store is `jar`, so
/// any `Set-Cookie` on the response lands in the jar.
///
/// The response status is returned for logging only; it is not inspected.
#[instrument(level = "debug", skip_all, fields(method = %login.method, url = %login.url))]
pub(crate) async fn send_login(
    jar: Arc<CookieJar>,
    settings: &LoginClientSettings,
    login: LoginRequest,
) -> Result<StatusCode, SessionError> {
    let client = build_login_client(settings, jar, &login)?;
    let target = login.target_url();

    let mut builder = client
        .request(login.method.clone(), target.clone())
        .headers(login.headers);
    if let Some(body) = login.body {
        builder = builder.body(body);
    }

    if login.debug {
        info!(method = %login.method, url = %target, "sending login request");
    }
    let response = builder
        .send()
        .await
        .map_err(|e| SessionError::login(target.as_str(), e))?;
    let status = response.status();

    if login.debug {
        info!(status = %status, url = %target, "login response received");
    } else {
        debug!(status = %status, "login response received");
    }
    Ok(status)
}

fn build_login_client(
    settings: &LoginClientSettings,
    jar: Arc<CookieJar>,
    login: &LoginRequest,
) -> Result<Client, SessionError> {
    let redirect = if login.follow_redirects {
        Policy::default()
    } else {
        Policy::none()
    };

    Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.clone())
        .gzip(true)
        .redirect(redirect)
        .connection_verbose(login.debug)
        .cookie_provider(jar)
        .build()
        .map_err(|source| SessionError::ClientBuild { source })
}

fn resolve_login_url(uri: &str, base_uri: Option<&Url>) -> Result<Url, SessionError> {
    match Url::parse(uri) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base_uri.ok_or_else(|| {
                SessionError::invalid_login_url(uri, "relative URI and no base_uri given")
            })?;
            base.join(uri)
                .map_err(|e| SessionError::invalid_login_url(uri, e.to_string()))
        }
        Err(e) => Err(SessionError::invalid_login_url(uri, e.to_string())),
    }
}

/// Flattens login fields into ordered key/value pairs.
///
/// Nested values use bracketed keys (`user[name]=x`, `ids[0]=1`), booleans
/// become `1`/`0` and nulls are dropped. A bare scalar is treated as a
/// one-element mapping keyed `0`.
pub(crate) fn field_pairs(fields: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    match fields {
        Value::Object(map) => {
            for (key, value) in map {
                push_pairs(&mut pairs, key.clone(), value);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                push_pairs(&mut pairs, index.to_string(), value);
            }
        }
        Value::Null => {}
        scalar => push_pairs(&mut pairs, "0".to_string(), scalar),
    }
    pairs
}

fn push_pairs(pairs: &mut Vec<(String, String)>, key: String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(flag) => pairs.push((key, if *flag { "1" } else { "0" }.to_string())),
        Value::Number(number) => pairs.push((key, number.to_string())),
        Value::String(text) => pairs.push((key, text.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                push_pairs(pairs, format!("{key}[{index}]"), item);
            }
        }
        Value::Object(map) => {
            for (name, item) in map {
                push_pairs(pairs, format!("{key}[{name}]"), item);
            }
        }
    }
}
