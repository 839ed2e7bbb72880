//! Dispatch instrumentation.
//!
//! Wraps every dispatch in a `relay.dispatch` span and records counters and a
//! latency histogram through the `metrics` facade. No exporter is installed
//! here; the host application decides where metrics go.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::dispatch::{self, DispatchKind};
use crate::network::middleware::REQUEST_ID_HEADER;

/// Counter of finished dispatches, labelled by `kind` and `outcome`.
pub const DISPATCH_TOTAL: &str = "relay_dispatch_total";

/// Histogram of dispatch latency in seconds, labelled by `kind`.
pub const DISPATCH_DURATION: &str = "relay_dispatch_duration_seconds";

/// Outcome label for a response status.
#[must_use]
pub fn outcome(status: StatusCode) -> &'static str {
    if status.is_server_error() {
        "error"
    } else if status.is_client_error() {
        "rejected"
    } else {
        "ok"
    }
}

// ---------------------------------------------------------------------------
// InstrumentLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments dispatches with a span, counters, and timing.
#[derive(Debug, Clone)]
pub struct InstrumentLayer {
    rpc_path: Arc<str>,
}

impl InstrumentLayer {
    #[must_use]
    pub fn new(rpc_path: impl Into<Arc<str>>) -> Self {
        Self {
            rpc_path: rpc_path.into(),
        }
    }
}

impl<S> Layer<S> for InstrumentLayer {
    type Service = InstrumentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InstrumentService {
            inner,
            rpc_path: Arc::clone(&self.rpc_path),
        }
    }
}

// ---------------------------------------------------------------------------
// InstrumentService
// ---------------------------------------------------------------------------

/// Service wrapper that records dispatch duration and outcome.
#[derive(Debug, Clone)]
pub struct InstrumentService<S> {
    inner: S,
    rpc_path: Arc<str>,
}

impl<S> Service<Request<Bytes>> for InstrumentService<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>> + Send,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response<Bytes>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Bytes>, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let kind = dispatch::kind_of(&request, &self.rpc_path).as_str();
        let method = request.method().to_string();
        let path = request.uri().path().to_string();
        let correlation_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let span = info_span!(
            "relay.dispatch",
            kind = kind,
            method = %method,
            path = %path,
            correlation_id = %correlation_id,
            status = tracing::field::Empty,
            outcome = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        let fut = self.inner.call(request);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let (status, outcome) = match &result {
                    Ok(response) => (response.status().as_u16(), outcome(response.status())),
                    Err(_) => (StatusCode::INTERNAL_SERVER_ERROR.as_u16(), "error"),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                let span = tracing::Span::current();
                span.record("status", status);
                span.record("outcome", outcome);
                span.record("duration_ms", duration_ms);

                metrics::counter!(DISPATCH_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
                metrics::histogram!(DISPATCH_DURATION, "kind" => kind).record(elapsed.as_secs_f64());

                tracing::info!(status, outcome, duration_ms, "dispatch complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use tower::ServiceExt;

    use super::*;
    use crate::dispatch::DispatchConfig;

    /// Answers every request with the status encoded in its path.
    struct StatusService;

    impl Service<Request<Bytes>> for StatusService {
        type Response = Response<Bytes>;
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Response<Bytes>, Infallible>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, request: Request<Bytes>) -> Self::Future {
            let status = request
                .uri()
                .path()
                .trim_start_matches('/')
                .parse::<u16>()
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::OK);
            Box::pin(async move {
                let mut response = Response::new(Bytes::from_static(b"{}"));
                *response.status_mut() = status;
                Ok(response)
            })
        }
    }

    #[tokio::test]
    async fn instrument_layer_passes_through_response() {
        let svc = InstrumentLayer::new(DispatchConfig::default().rpc_path).layer(StatusService);
        let request = Request::builder().uri("/418").body(Bytes::new()).unwrap();

        let response = svc.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.body(), &Bytes::from_static(b"{}"));
    }

    #[test]
    fn outcome_labels_follow_status_class() {
        assert_eq!(outcome(StatusCode::OK), "ok");
        assert_eq!(outcome(StatusCode::NO_CONTENT), "ok");
        assert_eq!(outcome(StatusCode::FORBIDDEN), "rejected");
        assert_eq!(outcome(StatusCode::INTERNAL_SERVER_ERROR), "error");
    }
}
