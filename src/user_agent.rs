//! User-Agent string for the login client.

/// Default User-Agent for login requests (identifies the crate and version).
#[must_use]
pub(crate) fn default_login_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("cookie-session/{version} (login)")
}
