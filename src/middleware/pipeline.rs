//! Handler chain composition and the reqwest-backed transport.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Request, Response};
use tracing::{debug, instrument};

use crate::error::SessionError;

use super::{Handler, Middleware, RequestOptions};

/// Terminal handler that executes requests on a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for ReqwestTransport {
    #[instrument(skip(self, request, _options), fields(method = %request.method(), url = %request.url()))]
    async fn handle(
        &self,
        request: Request,
        _options: RequestOptions,
    ) -> Result<Response, SessionError> {
        let url = request.url().to_string();
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| SessionError::transport(url, e))?;
        debug!(status = %response.status(), "transport response");
        Ok(response)
    }
}

/// An ordered middleware stack in front of a terminal handler.
///
/// Middleware registered first runs outermost: it sees the request first and
/// the response last.
pub struct Pipeline {
    transport: Arc<dyn Handler>,
    layers: Vec<Arc<dyn Middleware>>,
    handler: Arc<dyn Handler>,
}

impl Pipeline {
    /// Creates a pipeline with no middleware.
    pub fn new(transport: impl Handler + 'static) -> Self {
        let transport: Arc<dyn Handler> = Arc::new(transport);
        Self {
            handler: Arc::clone(&transport),
            transport,
            layers: Vec::new(),
        }
    }

    /// Appends a middleware layer (inside all previously added layers).
    #[must_use]
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.layers.push(Arc::new(middleware));
        self.handler = self.compose();
        self
    }

    /// Returns the number of middleware layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Returns the composed handler.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }

    /// Sends a request through every layer.
    ///
    /// # Errors
    ///
    /// Returns whatever error a layer or the transport raises.
    pub async fn send(
        &self,
        request: Request,
        options: RequestOptions,
    ) -> Result<Response, SessionError> {
        self.handler.handle(request, options).await
    }

    fn compose(&self) -> Arc<dyn Handler> {
        self.layers
            .iter()
            .rev()
            .fold(Arc::clone(&self.transport), |next, layer| {
                layer.intercept(next)
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use reqwest::Method;
    use reqwest::header::HeaderValue;

    use super::*;

    /// Records the `x-trace` header each request carried when it hit the transport.
    struct RecordingTransport {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Handler for RecordingTransport {
        async fn handle(
            &self,
            request: Request,
            _options: RequestOptions,
        ) -> Result<Response, SessionError> {
            let trace = request
                .headers()
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            self.seen.lock().unwrap().push(trace);
            Ok(Response::from(http::Response::new("")))
        }
    }

    /// Appends its tag to the `x-trace` header.
    struct Tag(&'static str);

    struct Tagged {
        tag: &'static str,
        next: Arc<dyn Handler>,
    }

    #[async_trait]
    impl Handler for Tagged {
        async fn handle(
            &self,
            mut request: Request,
            options: RequestOptions,
        ) -> Result<Response, SessionError> {
            let current = request
                .headers()
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let value = format!("{current}{}", self.tag);
            request
                .headers_mut()
                .insert("x-trace", HeaderValue::from_str(&value).unwrap());
            self.next.handle(request, options).await
        }
    }

    impl Middleware for Tag {
        fn intercept(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
            Arc::new(Tagged { tag: self.0, next })
        }
    }

    fn request() -> Request {
        Request::new(Method::GET, "http://example.org/".parse().unwrap())
    }

    #[tokio::test]
    async fn test_first_registered_layer_runs_outermost() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(RecordingTransport {
            seen: Arc::clone(&seen),
        })
        .with(Tag("a"))
        .with(Tag("b"));

        assert_eq!(pipeline.layer_count(), 2);
        pipeline.send(request(), RequestOptions::new()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), ["ab"]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_hits_transport_directly() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(RecordingTransport {
            seen: Arc::clone(&seen),
        });
        pipeline.send(request(), RequestOptions::new()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), [""]);
    }
}
