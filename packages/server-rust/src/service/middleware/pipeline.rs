//! Pipeline composition: wraps the dispatcher with its middleware layers.

use tower::ServiceBuilder;

use super::instrument::{InstrumentLayer, InstrumentService};
use crate::dispatch::Dispatcher;

/// The dispatcher as served: instrumented, `Clone`, infallible.
pub type DispatchPipeline = InstrumentService<Dispatcher>;

/// Builds the dispatch pipeline around `dispatcher`.
///
/// Timeouts, CORS, and compression are applied at the HTTP edge by
/// [`crate::network::middleware::build_http_layers`]; only instrumentation
/// lives here so it sees the framed status of every dispatch.
#[must_use]
pub fn build_dispatch_pipeline(dispatcher: Dispatcher) -> DispatchPipeline {
    let rpc_path = dispatcher.config().rpc_path.clone();
    ServiceBuilder::new()
        .layer(InstrumentLayer::new(rpc_path))
        .service(dispatcher)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Method, Request, StatusCode};
    use relay_core::{AccessPolicy, Procedure, RelayIndex, Route};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::dispatch::DispatchConfig;

    fn dispatcher() -> Dispatcher {
        let index = RelayIndex::with([
            relay_core::Entry::from(
                Route::get("/ping")
                    .access(AccessPolicy::Public)
                    .handle(|_| async { Ok(json!("pong")) }),
            ),
            Procedure::method("ping").handle(|_| async { Ok(json!("pong")) }).into(),
        ])
        .unwrap();
        Dispatcher::new(index, DispatchConfig::default())
    }

    #[tokio::test]
    async fn pipeline_serves_rest_and_rpc() {
        let svc = build_dispatch_pipeline(dispatcher());

        let rest = svc
            .clone()
            .oneshot(Request::builder().uri("/ping").body(Bytes::new()).unwrap())
            .await
            .unwrap();
        assert_eq!(rest.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(rest.body()).unwrap();
        assert_eq!(body, json!({ "data": "pong" }));

        let rpc = svc
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/rpc")
                    .body(Bytes::from_static(br#"{"relay":"1.0","method":"ping","id":"p"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(rpc.body()).unwrap();
        assert_eq!(body, json!({ "relay": "1.0", "result": "pong", "id": "p" }));
    }
}
