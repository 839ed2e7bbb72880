//! HTTP layers wrapped around the relay service.
//!
//! Listed outermost first: the first layer sees the request first and the
//! response last.

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use relay_core::route::ROUTE_METHODS;
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// Header carrying the correlation id of a request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

type Trace = TraceLayer<SharedClassifier<ServerErrorsAsFailures>>;

/// Layer stack returned by [`build_http_layers`].
pub type EdgeLayers = Stack<
    PropagateRequestIdLayer,
    Stack<TimeoutLayer, Stack<CorsLayer, Stack<CompressionLayer, Stack<Trace, Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>>>>>,
>;

/// Builds the edge stack:
///
/// 1. `SetRequestId`: UUID v4 `x-request-id` unless the caller sent one
/// 2. `Trace`
/// 3. `Compression` (gzip)
/// 4. `Cors`
/// 5. `Timeout`: 408 after `request_timeout`
/// 6. `PropagateRequestId`: echoes `x-request-id` on the response
///
/// The dispatcher adopts the request id as the correlation id.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> EdgeLayers {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors(config))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout))
        .layer(PropagateRequestIdLayer::new(request_id))
        .into_inner()
}

/// CORS for the configured origins, allowing every declarable verb plus `HEAD`.
fn cors(config: &NetworkConfig) -> CorsLayer {
    let origins = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(config.cors_origins.iter().filter_map(|o| o.parse().ok()))
    };

    let methods: Vec<Method> = ROUTE_METHODS.iter().cloned().chain([Method::HEAD]).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use axum::body::Body;
    use axum::http::header::{ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
    use axum::http::{Request, Response};
    use tower::{service_fn, ServiceExt};

    use super::*;

    async fn ok(_: Request<Body>) -> Result<Response<Body>, Infallible> {
        Ok(Response::new(Body::empty()))
    }

    #[tokio::test]
    async fn request_id_is_generated_and_echoed() {
        let service = ServiceBuilder::new()
            .layer(build_http_layers(&NetworkConfig::default()))
            .service(service_fn(ok));

        let response = service
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert_eq!(id.len(), 36);
    }

    #[tokio::test]
    async fn preflight_allows_configured_origin_and_route_verbs() {
        let config = NetworkConfig {
            cors_origins: vec!["https://app.relay.test".to_string()],
            ..NetworkConfig::default()
        };
        let service = ServiceBuilder::new()
            .layer(build_http_layers(&config))
            .service(service_fn(ok));

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/users")
            .header(ORIGIN, "https://app.relay.test")
            .header("access-control-request-method", "PATCH")
            .body(Body::empty())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();

        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.relay.test");
        let methods = response.headers()[ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("PATCH"));
        assert!(methods.contains("HEAD"));
    }
}
