//! Request dispatch: one pipeline for REST routes and RPC procedures.
//!
//! 1. **Context** (`mod.rs`): session resolution and the `RequestContext`
//! 2. **REST** (`rest`): resolve, access, params, query, body
//! 3. **RPC** (`rpc`): envelope, procedure lookup, params
//! 4. **Pipeline** (`pipeline`): action chain and handler, shared by both
//! 5. **Framing** (`frame`): envelopes, status codes, HEAD suppression

mod body;
mod frame;
mod pipeline;
mod rest;
mod rpc;

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::request::Parts;
use http::{Method, Request, Response};
use relay_core::handler::BoxFuture;
use relay_core::{RelayError, RelayIndex, RequestContext};
use tower::Service;

use crate::network::middleware::REQUEST_ID_HEADER;
use crate::session::{NoSessions, SessionResolver};

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Path that `POST` RPC envelopes are sent to.
    pub rpc_path: String,
    /// Largest accepted request body in bytes.
    pub body_limit: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rpc_path: "/rpc".to_string(),
            body_limit: 2 * 1024 * 1024,
        }
    }
}

/// Transport style of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    Rest,
    Rpc,
}

impl DispatchKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Rpc => "rpc",
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Executes requests against a frozen [`RelayIndex`].
///
/// Cloning is cheap; the index, session resolver, and configuration are shared.
#[derive(Clone)]
pub struct Dispatcher {
    index: Arc<RelayIndex>,
    sessions: Arc<dyn SessionResolver>,
    config: Arc<DispatchConfig>,
}

impl Dispatcher {
    /// Creates a dispatcher that treats every request as anonymous.
    #[must_use]
    pub fn new(index: RelayIndex, config: DispatchConfig) -> Self {
        Self {
            index: Arc::new(index),
            sessions: Arc::new(NoSessions),
            config: Arc::new(config),
        }
    }

    /// Replaces the session resolver.
    #[must_use]
    pub fn with_sessions(mut self, resolver: impl SessionResolver + 'static) -> Self {
        self.sessions = Arc::new(resolver);
        self
    }

    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    #[must_use]
    pub fn index(&self) -> &RelayIndex {
        &self.index
    }

    /// `POST` to the RPC path is RPC; everything else is REST.
    #[must_use]
    pub fn kind_of<B>(&self, request: &Request<B>) -> DispatchKind {
        kind_of(request, &self.config.rpc_path)
    }

    /// Runs one request to completion. Every failure is framed into the response.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        let kind = self.kind_of(&request);
        let (parts, body) = request.into_parts();

        let session = self.sessions.resolve(&parts.headers).await;
        let ctx = context(&parts, session);

        match kind {
            DispatchKind::Rpc => rpc::handle(&self.index, body, &ctx).await,
            DispatchKind::Rest => rest::handle(&self.index, &parts, body, &ctx).await,
        }
    }

    /// Frames an error raised before dispatch started, such as an unreadable
    /// body, in the envelope the request's transport style expects.
    #[must_use]
    pub fn reject(&self, parts: &Parts, error: RelayError) -> Response<Bytes> {
        let ctx = context(parts, None);
        match classify(&parts.method, parts.uri.path(), &self.config.rpc_path) {
            DispatchKind::Rpc => frame::rpc(Err(error), None, &ctx),
            DispatchKind::Rest => frame::rest(Err(error), parts.method == Method::HEAD, &ctx),
        }
    }
}

fn context(parts: &Parts, session: Option<relay_core::Session>) -> RequestContext {
    let correlation_id = parts
        .headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);
    RequestContext::builder(parts.method.clone(), parts.uri.path())
        .correlation_id(correlation_id)
        .headers(parts.headers.clone())
        .session(session)
        .build()
}

pub(crate) fn kind_of<B>(request: &Request<B>, rpc_path: &str) -> DispatchKind {
    classify(request.method(), request.uri().path(), rpc_path)
}

fn classify(method: &Method, path: &str, rpc_path: &str) -> DispatchKind {
    if *method == Method::POST && path == rpc_path {
        DispatchKind::Rpc
    } else {
        DispatchKind::Rest
    }
}

impl Service<Request<Bytes>> for Dispatcher {
    type Response = Response<Bytes>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response<Bytes>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.dispatch(request).await) })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
