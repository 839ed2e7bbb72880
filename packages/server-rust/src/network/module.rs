//! Network module with deferred startup lifecycle.
//!
//! `new()` takes the configuration and the dispatcher, `start()` binds the
//! TCP listener, and `serve()` accepts connections until shutdown. Binding
//! separately lets callers learn the OS-assigned port before serving.

use std::future::Future;

use anyhow::Context as _;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::middleware::build_http_layers;
use crate::dispatch::Dispatcher;
use crate::service::RelayService;

/// Manages the HTTP server lifecycle for one relay index.
pub struct NetworkModule {
    config: NetworkConfig,
    dispatcher: Dispatcher,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher,
            listener: None,
        }
    }

    /// Assembles the axum router: every path falls through to the relay
    /// service, wrapped in the HTTP middleware stack.
    #[must_use]
    pub fn build_router(&self) -> Router {
        build_router(&self.config, self.dispatcher.clone())
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "relay listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until the shutdown future resolves, then lets
    /// in-flight requests finish.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server
    /// hits a fatal I/O error.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };
        info!(
            rpc_path = %self.dispatcher.config().rpc_path,
            routes = self.dispatcher.index().len(),
            "serving relay requests"
        );
        let router = build_router(&self.config, self.dispatcher);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("relay server stopped");
        Ok(())
    }
}

fn build_router(config: &NetworkConfig, dispatcher: Dispatcher) -> Router {
    Router::new()
        .fallback_service(RelayService::new(dispatcher))
        .layer(build_http_layers(config))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::{Request, StatusCode};
    use relay_core::{AccessPolicy, RelayIndex, Route};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::dispatch::DispatchConfig;

    fn module() -> NetworkModule {
        let index = RelayIndex::with([Route::get("/ping")
            .access(AccessPolicy::Public)
            .handle(|ctx| async move {
                Ok(json!({ "correlation": ctx.request().correlation_id() }))
            })])
        .unwrap();
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            ..NetworkConfig::default()
        };
        NetworkModule::new(config, Dispatcher::new(index, DispatchConfig::default()))
    }

    #[test]
    fn new_creates_module_without_binding() {
        assert!(module().listener.is_none());
    }

    #[tokio::test]
    async fn router_propagates_request_id_as_correlation_id() {
        let response = module()
            .build_router()
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("x-request-id", "req-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-1");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "data": { "correlation": "req-1" } }));
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module();
        let port = module.start().await.unwrap();
        assert!(port > 0, "OS-assigned port should be > 0");
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let result = module().serve(std::future::pending::<()>()).await;
        assert!(result.is_err());
    }
}
