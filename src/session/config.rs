//! Login configuration and login client settings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::user_agent;

/// Default login client connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default login client overall timeout (30 seconds).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading a [`LoginConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration is not valid JSON or does not match the schema.
    #[error("invalid login configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// The login URI is empty.
    #[error("login configuration has an empty `uri`")]
    EmptyUri,

    /// The method name is not one of GET, POST or JSON.
    #[error("unknown login method '{0}' (expected GET, POST or JSON)")]
    UnknownMethod(String),
}

/// How credentials are sent on the login call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoginMethod {
    /// Fields go into the query string of a GET request.
    Get,
    /// Fields are form-encoded into a POST body.
    #[default]
    Post,
    /// Fields are serialized as a JSON POST body.
    Json,
}

impl FromStr for LoginMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "JSON" => Ok(Self::Json),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

/// Where and how to log in. Immutable once built.
///
/// Field values are redacted in Debug output since they usually hold
/// credentials.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginConfig {
    uri: String,
    #[serde(default)]
    method: LoginMethod,
    #[serde(default)]
    fields: Value,
}

impl LoginConfig {
    /// Creates a POST login configuration.
    #[must_use]
    pub fn new(uri: impl Into<String>, fields: impl Into<Value>) -> Self {
        Self {
            uri: uri.into(),
            method: LoginMethod::Post,
            fields: fields.into(),
        }
    }

    /// Sets the login method.
    #[must_use]
    pub fn with_method(mut self, method: LoginMethod) -> Self {
        self.method = method;
        self
    }

    /// Loads a configuration from `{"uri": .., "fields": .., "method": ..}`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed input and
    /// [`ConfigError::EmptyUri`] when `uri` is blank.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates values that serde cannot check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyUri`] when `uri` is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.trim().is_empty() {
            return Err(ConfigError::EmptyUri);
        }
        Ok(())
    }

    /// The login target, possibly relative to a per-call base URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The login method.
    #[must_use]
    pub fn method(&self) -> LoginMethod {
        self.method
    }

    /// The login fields, in configured order.
    #[must_use]
    pub fn fields(&self) -> &Value {
        &self.fields
    }
}

impl fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field_names: Vec<&str> = match &self.fields {
            Value::Object(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        f.debug_struct("LoginConfig")
            .field("uri", &self.uri)
            .field("method", &self.method)
            .field("fields", &field_names)
            .finish_non_exhaustive()
    }
}

/// Networking policy for the login client.
#[derive(Debug, Clone)]
pub struct LoginClientSettings {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Overall request timeout.
    pub timeout: Duration,
    /// User-Agent header sent on login.
    pub user_agent: String,
}

impl Default for LoginClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            user_agent: user_agent::default_login_user_agent(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_json_defaults_method_to_post() {
        let config = LoginConfig::from_json(
            r#"{"uri": "http://example.org/login", "fields": {"user": "John Doe", "password": "pass"}}"#,
        )
        .unwrap();
        assert_eq!(config.uri(), "http://example.org/login");
        assert_eq!(config.method(), LoginMethod::Post);
        let keys: Vec<&String> = config.fields().as_object().unwrap().keys().collect();
        assert_eq!(keys, ["user", "password"], "field order must be preserved");
    }

    #[test]
    fn test_from_json_reads_method() {
        let config =
            LoginConfig::from_json(r#"{"uri": "/login", "fields": {}, "method": "JSON"}"#).unwrap();
        assert_eq!(config.method(), LoginMethod::Json);

        let err = LoginConfig::from_json(r#"{"uri": "/login", "method": "PUT"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_from_json_rejects_empty_uri() {
        let err = LoginConfig::from_json(r#"{"uri": "  ", "fields": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyUri));
    }

    #[test]
    fn test_login_method_from_str() {
        assert_eq!("get".parse::<LoginMethod>().unwrap(), LoginMethod::Get);
        assert_eq!("POST".parse::<LoginMethod>().unwrap(), LoginMethod::Post);
        assert!(matches!(
            "DELETE".parse::<LoginMethod>(),
            Err(ConfigError::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_debug_redacts_field_values() {
        let config = LoginConfig::new(
            "http://example.org/login",
            json!({"user": "john", "password": "hunter2"}),
        );
        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("password"));
        assert!(!debug_str.contains("hunter2"), "got: {debug_str}");
    }

    #[test]
    fn test_default_client_settings() {
        let settings = LoginClientSettings::default();
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert!(settings.user_agent.starts_with("cookie-session/"));
    }
}
