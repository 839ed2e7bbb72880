//! Call generator: binds catalog declarations into callables.
//!
//! A [`RouteCall`] validates its arguments against the route's schemas,
//! renders the path, serializes the query, encodes the body according to the
//! route's [`ContentKind`], and re-validates a successful payload against the
//! declared output. A [`ProcedureCall`] does the same over RPC.

use std::sync::Arc;

use http::HeaderMap;
use relay_core::{Catalog, ContentKind, Entry, Procedure, Route, Schema, SchemaRef};
use serde_json::{Map, Value};
use tracing::debug;

use crate::adapter::{RelayAdapter, RelayInput};
use crate::decode::RelayResult;
use crate::error::ClientError;

// ---------------------------------------------------------------------------
// RelayClient
// ---------------------------------------------------------------------------

/// Entry point: an adapter plus the catalog it serves.
#[derive(Debug, Clone)]
pub struct RelayClient {
    adapter: Arc<RelayAdapter>,
    catalog: Arc<Catalog>,
}

impl RelayClient {
    #[must_use]
    pub fn new(adapter: RelayAdapter, catalog: Catalog) -> Self {
        Self {
            adapter: Arc::new(adapter),
            catalog: Arc::new(catalog),
        }
    }

    #[must_use]
    pub fn adapter(&self) -> &RelayAdapter {
        &self.adapter
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Callable for the route named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownEndpoint`] when `name` is not a route.
    pub fn route(&self, name: &str) -> Result<RouteCall, ClientError> {
        match self.catalog.get(name) {
            Some(Entry::Route(route)) => Ok(RouteCall {
                name: name.to_string(),
                route: route.clone(),
                adapter: Arc::clone(&self.adapter),
            }),
            _ => Err(ClientError::UnknownEndpoint(name.to_string())),
        }
    }

    /// Callable for the procedure named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownEndpoint`] when `name` is not a procedure.
    pub fn procedure(&self, name: &str) -> Result<ProcedureCall, ClientError> {
        match self.catalog.get(name) {
            Some(Entry::Procedure(procedure)) => Ok(ProcedureCall {
                name: name.to_string(),
                procedure: procedure.clone(),
                adapter: Arc::clone(&self.adapter),
            }),
            _ => Err(ClientError::UnknownEndpoint(name.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CallArgs
// ---------------------------------------------------------------------------

/// Arguments of a route call. Everything is optional.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub params: Option<Value>,
    pub query: Option<Value>,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl CallArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(query);
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
}

// ---------------------------------------------------------------------------
// RouteCall
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RouteCall {
    name: String,
    route: Route,
    adapter: Arc<RelayAdapter>,
}

impl RouteCall {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Calls the route.
    ///
    /// Server-side failures come back as [`RelayResult::Error`]; `Err` is
    /// reserved for failures on this side of the wire.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidArguments`] when an argument fails its schema
    /// - [`ClientError::MissingParam`] when a path placeholder has no value
    /// - [`ClientError::InvalidResponse`] when the payload fails the output schema
    /// - [`ClientError::Encode`] / [`ClientError::Transport`] from the adapter
    pub async fn call(&self, args: CallArgs) -> Result<RelayResult, ClientError> {
        let route = &self.route;

        let params = args.params.unwrap_or_else(|| Value::Object(Map::new()));
        let params = self.check("params", route.params_schema(), params).await?;
        let path = route.pattern()?.render(&as_object(params))?;

        let query = match (args.query, route.query_schema()) {
            (Some(query), schema) => Some(self.check("query", schema, query).await?),
            (None, Some(schema)) => Some(self.check("query", Some(schema), Value::Object(Map::new())).await?),
            (None, None) => None,
        };

        let body = match (args.body, route.body_schema()) {
            (Some(body), schema) => Some(self.check("body", schema, body).await?),
            (None, Some(schema)) => Some(self.check("body", Some(schema), Value::Object(Map::new())).await?),
            (None, None) => None,
        };

        let mut input = RelayInput::new(route.method().clone(), path).headers(args.headers);
        if let Some(query) = query {
            input = input.query(as_object(query));
        }
        input.body = body;

        debug!(endpoint = %self.name, kind = ?route.content_kind(), "calling route");
        let result = match route.content_kind() {
            ContentKind::Json => self.adapter.json(input).await?,
            ContentKind::Form => self.adapter.data(input).await?,
        };

        match (result, route.output_schema()) {
            (RelayResult::Success { data }, Some(schema)) => {
                let data = schema.parse(data).await.map_err(|report| ClientError::InvalidResponse {
                    endpoint: self.name.clone(),
                    report,
                })?;
                Ok(RelayResult::Success { data })
            }
            (result, _) => Ok(result),
        }
    }

    async fn check(&self, part: &'static str, schema: Option<&SchemaRef>, value: Value) -> Result<Value, ClientError> {
        match schema {
            Some(schema) => schema.parse(value).await.map_err(|report| ClientError::InvalidArguments {
                part,
                endpoint: self.name.clone(),
                report,
            }),
            None => Ok(value),
        }
    }
}

/// Fields of an object value; anything else has none.
fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(fields) => fields,
        _ => Map::new(),
    }
}

// ---------------------------------------------------------------------------
// ProcedureCall
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ProcedureCall {
    name: String,
    procedure: Procedure,
    adapter: Arc<RelayAdapter>,
}

impl ProcedureCall {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls the procedure and returns its result.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidArguments`] when `params` fail the declared schema
    /// - [`ClientError::Remote`] when the server answers with an error envelope
    /// - [`ClientError::InvalidResponse`] when the result fails the declared schema
    /// - [`ClientError::Transport`] when no response was received
    pub async fn call(&self, params: Option<Value>) -> Result<Value, ClientError> {
        let procedure = &self.procedure;

        let params = match procedure.params_schema() {
            Some(schema) => Some(
                schema
                    .parse(params.unwrap_or(Value::Null))
                    .await
                    .map_err(|report| ClientError::InvalidArguments {
                        part: "params",
                        endpoint: self.name.clone(),
                        report,
                    })?,
            ),
            None => params,
        };

        let result = self.adapter.send(procedure.name(), params).await?.into_result()?;

        match procedure.result_schema() {
            Some(schema) => schema.parse(result).await.map_err(|report| ClientError::InvalidResponse {
                endpoint: self.name.clone(),
                report,
            }),
            None => Ok(result),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
