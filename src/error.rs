//! Error types for session and login operations.
//!
//! Variants carry the URL involved so callers can tell a failed login round
//! trip apart from a failed downstream request.

use thiserror::Error;

/// Errors surfaced by the cookie session pipeline.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The login round trip failed at the transport level.
    #[error("login request to {url} failed: {source}")]
    Login {
        /// The login target URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The wrapped request failed at the transport level.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The request URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The configured login URI cannot be turned into an absolute URL.
    #[error("invalid login URI '{url}': {reason}")]
    InvalidLoginUrl {
        /// The configured login URI.
        url: String,
        /// Why the URI was rejected.
        reason: String,
    },

    /// The login HTTP client could not be constructed.
    #[error("failed to build login HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Login fields could not be serialized as a JSON body.
    #[error("failed to encode login fields as JSON: {source}")]
    InvalidJsonFields {
        /// The underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl SessionError {
    /// Creates a login transport error.
    pub fn login(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Login {
            url: url.into(),
            source,
        }
    }

    /// Creates a downstream transport error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid login URI error.
    pub fn invalid_login_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLoginUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns true when the error came from the login round trip rather than
    /// the wrapped request.
    #[must_use]
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            Self::Login { .. } | Self::InvalidLoginUrl { .. } | Self::InvalidJsonFields { .. }
        )
    }
}

// No `From<reqwest::Error>`: every transport variant needs the URL for context,
// so callers go through `login()` / `transport()`.
