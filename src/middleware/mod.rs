//! Request pipeline: handlers, middleware and per-call options.
//!
//! # Architecture
//!
//! - [`Handler`] - Async trait for anything that turns a request into a response
//! - [`Middleware`] - Wraps a handler in another handler via [`Middleware::intercept`]
//! - [`Pipeline`] - Ordered middleware in front of a terminal transport
//! - [`ReqwestTransport`] - Terminal handler backed by `reqwest::Client`
//! - [`RequestOptions`] - Request-scoped options passed down the chain

mod options;
mod pipeline;

pub use options::{AuthCookieOptions, AuthScheme, LoginHook, RequestOptions};
pub use pipeline::{Pipeline, ReqwestTransport};

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Request, Response};

use crate::error::SessionError;

/// Something that can send a request and produce a response.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Arc<dyn Handler>`; Rust 2024 native async traits are not object-safe.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Sends `request` and resolves to its response.
    async fn handle(
        &self,
        request: Request,
        options: RequestOptions,
    ) -> Result<Response, SessionError>;
}

/// A layer that wraps an inner handler.
pub trait Middleware: Send + Sync {
    /// Returns a handler that runs this layer around `next`.
    fn intercept(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler>;
}
