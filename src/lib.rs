//! Cookie Session Library
//!
//! Login-driven cookie authentication for outgoing HTTP requests. A
//! [`CookieSession`] logs in once against a configured endpoint, keeps the
//! cookies the server hands out in a shared [`CookieJar`], and attaches them
//! to every request that opts in with `auth = cookie`.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`cookie`] - Cookie records, the thread-safe jar and seed parsing
//! - [`session`] - Login configuration, the login call and the session middleware
//! - [`middleware`] - Handler/middleware traits, the pipeline and request options
//! - [`error`] - Error types surfaced to callers

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cookie;
pub mod error;
pub mod middleware;
pub mod session;
mod user_agent;

// Re-export commonly used types
pub use cookie::{Cookie, CookieJar, CookieParseError, SeedCookies};
pub use error::SessionError;
pub use middleware::{
    AuthCookieOptions, AuthScheme, Handler, LoginHook, Middleware, Pipeline, RequestOptions,
    ReqwestTransport,
};
pub use session::{
    ConfigError, CookieSession, LoginClientSettings, LoginConfig, LoginMethod, LoginRequest,
    SessionState,
};
