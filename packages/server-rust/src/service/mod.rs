//! Tower service that carries HTTP requests into the dispatch pipeline.
//!
//! 1. **Body** (`RelayService`): buffer the request body up to the configured limit
//! 2. **Middleware** (`middleware`): instrumentation around the dispatcher
//! 3. **Dispatch** (`crate::dispatch`): REST or RPC execution and framing

pub mod middleware;

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::Response;
use http::Request;
use relay_core::RelayError;
use serde_json::json;
use tower::{Service, ServiceExt};
use tracing::debug;

use self::middleware::{build_dispatch_pipeline, DispatchPipeline};
use crate::dispatch::Dispatcher;

pub use middleware::{InstrumentLayer, InstrumentService};

// ---------------------------------------------------------------------------
// RelayService
// ---------------------------------------------------------------------------

/// axum-facing service: buffers the body, then runs the dispatch pipeline.
///
/// Mounted as the router's fallback so every path reaches the relay index.
#[derive(Clone)]
pub struct RelayService {
    dispatcher: Dispatcher,
    pipeline: DispatchPipeline,
}

impl RelayService {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            pipeline: build_dispatch_pipeline(dispatcher.clone()),
            dispatcher,
        }
    }
}

impl Service<Request<Body>> for RelayService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        let pipeline = self.pipeline.clone();
        let limit = dispatcher.config().body_limit;

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let bytes = match axum::body::to_bytes(body, limit).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(error = %e, limit, "request body rejected");
                    let error = RelayError::bad_request("Request body could not be read")
                        .with_data(json!({ "reason": e.to_string(), "limit": limit }));
                    return Ok(dispatcher.reject(&parts, error).map(Body::from));
                }
            };

            let response = pipeline.oneshot(Request::from_parts(parts, bytes)).await?;
            Ok(response.map(Body::from))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
