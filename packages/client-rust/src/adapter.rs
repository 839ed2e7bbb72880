//! The adapter: encodes a call, sends it through a [`Transport`], and
//! normalizes what comes back.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use relay_core::wire::JSON_CONTENT_TYPE;
use relay_core::{RelayError, RelayRequest, RelayResponse, RequestId};
use serde_json::{Map, Value};
use tracing::debug;

use crate::decode::{self, RelayResult};
use crate::encode;
use crate::error::ClientError;
use crate::transport::{HttpTransport, RequestBody, Transport, TransportRequest};

/// Mutates the headers of every outgoing request, e.g. to attach credentials.
pub type HeaderHook = Arc<dyn Fn(&mut HeaderMap) + Send + Sync>;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct HttpAdapterConfig {
    pub base_url: String,
    pub rpc_path: String,
    pub timeout_secs: u64,
    pub hooks: Vec<HeaderHook>,
}

impl HttpAdapterConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            rpc_path: "/rpc".to_string(),
            timeout_secs: 30,
            hooks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_hook(mut self, hook: impl Fn(&mut HeaderMap) + Send + Sync + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }
}

impl fmt::Debug for HttpAdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAdapterConfig")
            .field("base_url", &self.base_url)
            .field("rpc_path", &self.rpc_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RelayInput
// ---------------------------------------------------------------------------

/// One REST call, before encoding.
#[derive(Debug, Clone)]
pub struct RelayInput {
    pub method: Method,
    /// Path, already rendered.
    pub endpoint: String,
    pub query: Map<String, Value>,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl RelayInput {
    #[must_use]
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Map::new(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    fn target(&self) -> String {
        format!("{}{}", self.endpoint, encode::query_string(&self.query))
    }
}

// ---------------------------------------------------------------------------
// RelayAdapter
// ---------------------------------------------------------------------------

pub struct RelayAdapter {
    transport: Arc<dyn Transport>,
    rpc_path: String,
    hooks: Vec<HeaderHook>,
    next_id: AtomicU64,
}

impl RelayAdapter {
    #[must_use]
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            rpc_path: "/rpc".to_string(),
            hooks: Vec::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Adapter over [`HttpTransport`].
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be built.
    pub fn http(config: HttpAdapterConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
        let mut adapter = Self::new(transport).with_rpc_path(config.rpc_path);
        adapter.hooks = config.hooks;
        Ok(adapter)
    }

    #[must_use]
    pub fn with_rpc_path(mut self, rpc_path: impl Into<String>) -> Self {
        self.rpc_path = rpc_path.into();
        self
    }

    #[must_use]
    pub fn with_hook(mut self, hook: impl Fn(&mut HeaderMap) + Send + Sync + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn rpc_path(&self) -> &str {
        &self.rpc_path
    }

    /// Sends `input` with a JSON body. The content type is always
    /// `application/json`, whatever the caller or the hooks set.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when no response was received.
    pub async fn json(&self, input: RelayInput) -> Result<RelayResult, ClientError> {
        let mut request = TransportRequest::new(input.method.clone(), input.target());
        request.headers = input.headers;
        self.apply_hooks(&mut request.headers);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        if let Some(body) = input.body {
            request.body = RequestBody::Json(Bytes::from(body.to_string()));
        }
        self.request(request).await
    }

    /// Sends `input` as `multipart/form-data`. Any caller content type is
    /// dropped so the transport can set the boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Encode`] when the body is not an object or a
    /// file cannot be decoded, [`ClientError::Transport`] when no response
    /// was received.
    pub async fn data(&self, input: RelayInput) -> Result<RelayResult, ClientError> {
        let mut request = TransportRequest::new(input.method.clone(), input.target());
        request.headers = input.headers;
        self.apply_hooks(&mut request.headers);
        request.headers.remove(CONTENT_TYPE);
        request.body = match input.body {
            None | Some(Value::Null) => RequestBody::Empty,
            Some(Value::Object(fields)) => RequestBody::Form(encode::form_parts(&fields)?),
            Some(_) => {
                return Err(ClientError::Encode(
                    "multipart body must be a JSON object".to_string(),
                ))
            }
        };
        self.request(request).await
    }

    /// Sends an arbitrary request and normalizes the response. Hooks are not
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when no response was received.
    pub async fn request(&self, request: TransportRequest) -> Result<RelayResult, ClientError> {
        debug!(method = %request.method, endpoint = %request.endpoint, "relay call");
        let response = self.transport.send(request).await?;
        Ok(decode::decode(&response))
    }

    /// Sends one RPC call to the configured RPC path.
    ///
    /// A response that is not JSON, or not a relay envelope, is turned into
    /// an `UnprocessableContent` failure carrying the request id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when no response was received.
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<RelayResponse, ClientError> {
        let id = RequestId::from(self.next_id.fetch_add(1, Ordering::Relaxed));
        let envelope = RelayRequest::new(method, params, id.clone());
        let body = serde_json::to_vec(&envelope).map_err(|e| ClientError::Encode(e.to_string()))?;

        let mut request = TransportRequest::new(Method::POST, self.rpc_path.clone());
        self.apply_hooks(&mut request.headers);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        request.body = RequestBody::Json(Bytes::from(body));

        debug!(method, id = ?id, "relay rpc call");
        let response = self.transport.send(request).await?;

        let content_type = decode::content_type(&response.headers).unwrap_or_default();
        if decode::essence(content_type) != JSON_CONTENT_TYPE {
            let error = RelayError::unprocessable_content(format!(
                "Invalid 'content-type' in header, expected '{JSON_CONTENT_TYPE}', received '{content_type}'"
            ));
            return Ok(RelayResponse::failure(&error, Some(id)));
        }

        match serde_json::from_slice::<RelayResponse>(&response.body) {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                debug!(error = %e, "unreadable relay envelope");
                let error = RelayError::unprocessable_content("Invalid relay response returned from server");
                Ok(RelayResponse::failure(&error, Some(id)))
            }
        }
    }

    fn apply_hooks(&self, headers: &mut HeaderMap) {
        for hook in &self.hooks {
            hook(headers);
        }
    }
}

impl fmt::Debug for RelayAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayAdapter")
            .field("rpc_path", &self.rpc_path)
            .field("hooks", &self.hooks.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
