//! Handler signatures and the values handlers receive and return.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::error::RelayError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A fully formed HTTP response passed through the framing stage untouched.
pub type RawResponse = http::Response<Bytes>;

/// Type-erased route handler.
pub type RouteHandler = Arc<dyn Fn(RouteContext) -> BoxFuture<'static, anyhow::Result<Reply>> + Send + Sync>;

/// Type-erased procedure handler.
pub type ProcedureHandler =
    Arc<dyn Fn(ProcedureContext) -> BoxFuture<'static, anyhow::Result<Reply>> + Send + Sync>;

/// Maps an unexpected handler failure to a typed error.
pub type ErrorHook = Arc<dyn Fn(&anyhow::Error) -> RelayError + Send + Sync>;

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// What a handler produced.
#[derive(Debug)]
pub enum Reply {
    /// A domain value, framed as `{"data": ..}` or `result`.
    Data(Value),
    /// A prebuilt response, passed through.
    Raw(RawResponse),
    /// No value. REST answers 204, RPC answers `result: null`.
    Empty,
}

impl Reply {
    /// Serializes any value into [`Reply::Data`].
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> anyhow::Result<Self> {
        Ok(Self::Data(serde_json::to_value(value)?))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<RawResponse> for Reply {
    fn from(response: RawResponse) -> Self {
        Self::Raw(response)
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

// ---------------------------------------------------------------------------
// RouteContext
// ---------------------------------------------------------------------------

/// Argument handed to a route handler: the validated params, query, and body
/// merged into one object, followed by every action output.
#[derive(Debug, Clone)]
pub struct RouteContext {
    input: Map<String, Value>,
    request: RequestContext,
}

impl RouteContext {
    #[must_use]
    pub fn new(input: Map<String, Value>, request: RequestContext) -> Self {
        Self { input, request }
    }

    #[must_use]
    pub fn input(&self) -> &Map<String, Value> {
        &self.input
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.input.get(key)
    }

    /// String field of the merged input.
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(Value::as_str)
    }

    /// Deserializes the merged input into a typed struct.
    ///
    /// # Errors
    ///
    /// `InternalServerError` when the validated input does not fit `T`; the
    /// declared schemas and `T` disagree.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        serde_json::from_value(Value::Object(self.input.clone()))
            .map_err(|e| RelayError::internal(format!("Route input does not fit handler type: {e}")))
    }

    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    #[must_use]
    pub fn into_input(self) -> Map<String, Value> {
        self.input
    }
}

// ---------------------------------------------------------------------------
// ProcedureContext
// ---------------------------------------------------------------------------

/// Argument handed to a procedure handler.
#[derive(Debug, Clone)]
pub struct ProcedureContext {
    params: Option<Value>,
    outputs: Map<String, Value>,
    request: RequestContext,
}

impl ProcedureContext {
    #[must_use]
    pub fn new(params: Option<Value>, outputs: Map<String, Value>, request: RequestContext) -> Self {
        Self {
            params,
            outputs,
            request,
        }
    }

    /// Validated params, `None` when the procedure declares no params schema.
    #[must_use]
    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    /// Merged outputs of the action chain.
    #[must_use]
    pub fn outputs(&self) -> &Map<String, Value> {
        &self.outputs
    }

    /// Deserializes the params into a typed value.
    ///
    /// # Errors
    ///
    /// `InternalServerError` when the params do not fit `T`.
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        serde_json::from_value(self.params.clone().unwrap_or(Value::Null))
            .map_err(|e| RelayError::internal(format!("Procedure params do not fit handler type: {e}")))
    }

    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.request
    }
}

// ---------------------------------------------------------------------------
// Erasure helpers
// ---------------------------------------------------------------------------

pub(crate) fn route_handler<F, Fut, R>(f: F) -> RouteHandler
where
    F: Fn(RouteContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Into<Reply>,
{
    Arc::new(move |ctx| -> BoxFuture<'static, anyhow::Result<Reply>> {
        let fut = f(ctx);
        Box::pin(async move { fut.await.map(Into::into) })
    })
}

pub(crate) fn procedure_handler<F, Fut, R>(f: F) -> ProcedureHandler
where
    F: Fn(ProcedureContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Into<Reply>,
{
    Arc::new(move |ctx| -> BoxFuture<'static, anyhow::Result<Reply>> {
        let fut = f(ctx);
        Box::pin(async move { fut.await.map(Into::into) })
    })
}
