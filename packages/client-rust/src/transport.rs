//! Transports: move an encoded request to a relay server and bring the raw
//! response back.
//!
//! - [`HttpTransport`]: `reqwest` over the network
//! - [`ServiceTransport`]: any in-process `tower::Service`, such as the
//!   server's dispatcher

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use tower::{Service, ServiceExt};
use tracing::debug;

use crate::encode::{FormPart, PartValue};
use crate::error::ClientError;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// Body of an outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized JSON.
    Json(Bytes),
    /// Multipart form fields; the transport picks the boundary.
    Form(Vec<FormPart>),
}

impl RequestBody {
    /// Encodes the body into bytes, returning the content type a multipart
    /// body needs.
    ///
    /// Multipart bodies go through the same `reqwest` form [`HttpTransport`]
    /// sends, so both transports share one boundary and escaping scheme.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when a form part is rejected or the
    /// form cannot be streamed.
    pub async fn into_bytes(self) -> Result<(Option<HeaderValue>, Bytes), ClientError> {
        match self {
            Self::Empty => Ok((None, Bytes::new())),
            Self::Json(bytes) => Ok((None, bytes)),
            Self::Form(parts) => form_bytes(parts).await,
        }
    }
}

/// Renders a multipart form into its content type and body.
async fn form_bytes(parts: Vec<FormPart>) -> Result<(Option<HeaderValue>, Bytes), ClientError> {
    let client = reqwest::Client::builder().build().map_err(ClientError::transport)?;
    let mut request = client
        .post("http://relay.local/")
        .multipart(multipart_form(parts)?)
        .build()
        .map_err(ClientError::transport)?;

    let content_type = request.headers().get(CONTENT_TYPE).cloned();
    let body = match request.body_mut().take() {
        Some(body) => body.collect().await.map_err(ClientError::transport)?.to_bytes(),
        None => Bytes::new(),
    };
    Ok((content_type, body))
}

/// A request ready to be sent. `endpoint` is the path plus query string.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub endpoint: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl TransportRequest {
    #[must_use]
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Converts into an `http::Request`, setting the multipart content type
    /// when needed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the endpoint is not a valid URI
    /// or the body cannot be encoded.
    pub async fn into_http(self) -> Result<Request<Bytes>, ClientError> {
        let (content_type, body) = self.body.into_bytes().await?;
        let mut request = Request::builder()
            .method(self.method)
            .uri(self.endpoint)
            .body(body)
            .map_err(ClientError::transport)?;
        *request.headers_mut() = self.headers;
        if let Some(content_type) = content_type {
            request.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        Ok(request)
    }
}

/// Raw response as received.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl From<Response<Bytes>> for TransportResponse {
    fn from(response: Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }
}

/// Sends requests to a relay server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when no response was received.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ClientError>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// `reqwest`-backed transport rooted at a base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` does not parse or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        url::Url::parse(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::transport)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL of an endpoint.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ClientError> {
        let url = self.url(&request.endpoint);
        debug!(method = %request.method, %url, "sending relay request");

        let builder = self.http.request(request.method, &url).headers(request.headers);
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.body(bytes),
            RequestBody::Form(parts) => builder.multipart(multipart_form(parts)?),
        };

        let response = builder.send().await.map_err(ClientError::transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(ClientError::transport)?;
        Ok(TransportResponse { status, headers, body })
    }
}

fn multipart_form(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form, ClientError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match part.value {
            PartValue::Text(text) => form.text(part.name, text),
            PartValue::File {
                filename,
                content_type,
                data,
            } => {
                let file = reqwest::multipart::Part::bytes(data.to_vec())
                    .file_name(filename)
                    .mime_str(content_type.as_deref().unwrap_or("application/octet-stream"))
                    .map_err(ClientError::transport)?;
                form.part(part.name, file)
            }
        };
    }
    Ok(form)
}

// ---------------------------------------------------------------------------
// ServiceTransport
// ---------------------------------------------------------------------------

/// Transport over an in-process `tower::Service`, e.g. a server dispatcher.
#[derive(Debug, Clone)]
pub struct ServiceTransport<S> {
    service: S,
}

impl<S> ServiceTransport<S> {
    #[must_use]
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> Transport for ServiceTransport<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send,
{
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ClientError> {
        let request = request.into_http().await?;
        let response = self.service.clone().oneshot(request).await;
        match response {
            Ok(response) => Ok(response.into()),
            Err(never) => match never {},
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
