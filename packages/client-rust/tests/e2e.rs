//! Client against the real server stack, in-process and over TCP.

use anyhow::{anyhow, bail, ensure, Context};
use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method};
use relay_client::{
    file, CallArgs, ClientError, HttpAdapterConfig, RelayAdapter, RelayClient, RelayInput, RelayResult,
    ResponseError, ServiceTransport, Transport, TransportRequest, TransportResponse,
};
use relay_core::{ErrorKind, RelayError};
use relay_server::{demo, DispatchConfig, NetworkConfig, NetworkModule};
use serde_json::{json, Value};
use tower::ServiceExt;

const USER_ID: &str = "6f1c2d3e-4a5b-4c6d-8e7f-901234567890";

/// Drives the full axum router, HTTP layers included, without a socket.
#[derive(Clone)]
struct RouterTransport {
    router: Router,
}

#[async_trait]
impl Transport for RouterTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ClientError> {
        let request = request.into_http().await?.map(Body::from);
        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(ClientError::transport)?;
        Ok(TransportResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

fn in_process() -> anyhow::Result<RelayAdapter> {
    let dispatcher = demo::dispatcher(DispatchConfig::default())?;
    let router = NetworkModule::new(NetworkConfig::default(), dispatcher).build_router();
    Ok(RelayAdapter::new(RouterTransport { router }))
}

fn bearer(token: &'static str) -> impl Fn(&mut HeaderMap) + Send + Sync + 'static {
    move |headers: &mut HeaderMap| {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(AUTHORIZATION, value);
        }
    }
}

fn client(adapter: RelayAdapter) -> anyhow::Result<RelayClient> {
    Ok(RelayClient::new(adapter, demo::catalog()?))
}

fn server_error(result: RelayResult) -> anyhow::Result<RelayError> {
    match result.into_result() {
        Err(ResponseError::Server(error)) => Ok(error),
        other => bail!("expected a server error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_body_is_a_field_error() -> anyhow::Result<()> {
    let adapter = in_process()?;

    let input = RelayInput::new(Method::POST, "/users").body(json!({ "name": "John", "email": 42 }));
    let error = server_error(adapter.json(input).await?)?;
    assert_eq!(error.kind(), ErrorKind::BadRequest);
    assert_eq!(error.message(), "Invalid request body");
    let data = error.data().context("field errors attached")?;
    assert!(data["fields"].get("email").is_some());

    let client = client(adapter)?;
    let outcome = client
        .route("users.create")?
        .call(CallArgs::new().body(json!({ "name": "John", "email": 42 })))
        .await;
    assert!(matches!(outcome, Err(ClientError::InvalidArguments { part: "body", .. })));
    Ok(())
}

#[tokio::test]
async fn user_crud_round_trip() -> anyhow::Result<()> {
    let client = client(in_process()?.with_hook(bearer("alice:admin")))?;

    let created = client
        .route("users.create")?
        .call(CallArgs::new().body(json!({ "name": "John", "email": "john@example.com" })))
        .await?;
    let id = created
        .data()
        .and_then(Value::as_str)
        .context("create returns the new id")?
        .to_string();

    let fetched = client
        .route("users.get")?
        .call(CallArgs::new().params(json!({ "userId": id })))
        .await?;
    assert_eq!(fetched.into_result()?["email"], "john@example.com");

    let updated = client
        .route("users.update")?
        .call(
            CallArgs::new()
                .params(json!({ "userId": id }))
                .body(json!({ "name": "Johnny", "email": "johnny@example.com" })),
        )
        .await?;
    assert_eq!(updated, RelayResult::Success { data: Value::Null });

    let me = client.route("users.me")?.call(CallArgs::new()).await?;
    assert_eq!(me.data(), Some(&json!({ "accountId": "alice" })));

    let deleted = client
        .route("users.delete")?
        .call(CallArgs::new().params(json!({ "userId": id })))
        .await?;
    assert!(deleted.is_success());

    let missing = client
        .route("users.get")?
        .call(CallArgs::new().params(json!({ "userId": id })))
        .await?;
    assert_eq!(server_error(missing)?.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn access_failures_are_401_then_403() -> anyhow::Result<()> {
    let anonymous = client(in_process()?)?;
    let result = anonymous
        .route("users.delete")?
        .call(CallArgs::new().params(json!({ "userId": USER_ID })))
        .await?;
    assert_eq!(server_error(result)?.kind(), ErrorKind::Unauthorized);

    let member = client(in_process()?.with_hook(bearer("bob")))?;
    let result = member
        .route("users.delete")?
        .call(CallArgs::new().params(json!({ "userId": USER_ID })))
        .await?;
    assert_eq!(server_error(result)?.kind(), ErrorKind::Forbidden);
    Ok(())
}

#[tokio::test]
async fn procedure_add_validates_and_sums() -> anyhow::Result<()> {
    let client = client(in_process()?)?;
    let add = client.procedure("numbers.add")?;

    assert_eq!(add.call(Some(json!([1, 2]))).await?, json!(3));

    let error = match add.call(Some(json!([-1, 2]))).await {
        Err(ClientError::Remote(error)) => error,
        other => bail!("expected a remote error, got {other:?}"),
    };
    assert_eq!(error.kind(), ErrorKind::BadRequest);
    assert_eq!(error.message(), "Invalid numbers provided");
    Ok(())
}

#[tokio::test]
async fn raw_send_reports_unknown_methods() -> anyhow::Result<()> {
    let adapter = in_process()?;
    let response = adapter.send("numbers:multiply", Some(json!([2, 3]))).await?;
    let Err(error) = response.into_result() else {
        bail!("unknown method answered with a result");
    };
    assert_eq!(error.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn query_values_are_coerced_server_side() -> anyhow::Result<()> {
    let client = client(in_process()?)?;
    let result = client
        .route("numbers.addTwo")?
        .call(CallArgs::new().query(json!({ "a": 2, "b": 5 })))
        .await?;
    assert_eq!(result.data(), Some(&json!(7)));
    Ok(())
}

#[tokio::test]
async fn avatar_upload_goes_as_multipart() -> anyhow::Result<()> {
    let client = client(in_process()?)?;
    let result = client
        .route("users.avatar")?
        .call(
            CallArgs::new()
                .params(json!({ "userId": USER_ID }))
                .body(json!({ "avatar": file("me.png", Some("image/png"), b"\x89PNG"), "caption": "me" })),
        )
        .await?;
    assert_eq!(
        result.data(),
        Some(&json!({ "userId": USER_ID, "filename": "me.png", "size": 4 }))
    );
    Ok(())
}

#[tokio::test]
async fn unknown_path_is_not_found_through_raw_request() -> anyhow::Result<()> {
    let adapter = in_process()?;
    let result = adapter.request(TransportRequest::new(Method::GET, "/nowhere")).await?;
    assert_eq!(server_error(result)?.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn service_transport_skips_the_http_layers() -> anyhow::Result<()> {
    let dispatcher = demo::dispatcher(DispatchConfig::default())?;
    let client = client(RelayAdapter::new(ServiceTransport::new(dispatcher)))?;
    let add = client.procedure("numbers.add")?;
    assert_eq!(add.call(Some(json!([20, 22]))).await?, json!(42));
    Ok(())
}

#[tokio::test]
async fn http_transport_over_tcp() -> anyhow::Result<()> {
    let config = NetworkConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..NetworkConfig::default()
    };
    let mut module = NetworkModule::new(config, demo::dispatcher(DispatchConfig::default())?);
    let port = module.start().await?;
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(module.serve(async move {
        let _ = stopped.await;
    }));

    let adapter = RelayAdapter::http(HttpAdapterConfig::new(format!("http://127.0.0.1:{port}")))?;
    let client = client(adapter)?;

    let created = client
        .route("users.create")?
        .call(CallArgs::new().body(json!({ "name": "Ada", "email": "ada@example.com" })))
        .await?;
    ensure!(created.is_success(), "create over TCP failed: {created}");

    let sum = client.procedure("numbers.add")?.call(Some(json!([1, 2]))).await?;
    assert_eq!(sum, json!(3));

    stop.send(()).map_err(|()| anyhow!("server stopped early"))?;
    server.await??;
    Ok(())
}
