//! REST dispatch: resolve, access, params, query, body, then the shared pipeline.

use bytes::Bytes;
use http::request::Parts;
use http::{Method, Response};
use relay_core::{RelayError, RelayIndex, Reply, RequestContext, Resolution};
use serde_json::{json, Map, Value};
use tracing::error;

use super::pipeline::{self, validate, Invocation};
use super::{body, frame};

pub(crate) async fn handle(index: &RelayIndex, parts: &Parts, body: Bytes, ctx: &RequestContext) -> Response<Bytes> {
    let head = parts.method == Method::HEAD;
    let result = run(index, parts, body, ctx).await;
    frame::rest(result, head, ctx)
}

async fn run(index: &RelayIndex, parts: &Parts, raw_body: Bytes, ctx: &RequestContext) -> Result<Reply, RelayError> {
    let path = parts.uri.path();

    let resolved = match index.resolve(&parts.method, path) {
        Resolution::Matched(resolved) => resolved,
        Resolution::NotFound => {
            return Err(
                RelayError::not_found(format!("Invalid routing path provided for {} {path}", parts.method))
                    .with_data(json!({ "method": parts.method.as_str(), "path": path })),
            );
        }
        Resolution::UnsupportedMethod => {
            return Err(RelayError::method_not_allowed(format!(
                "Method '{}' is not supported",
                parts.method
            )));
        }
    };
    let route = resolved.route;

    let Some(policy) = route.access_policy() else {
        error!(route = %route, "route has no access policy");
        return Err(RelayError::internal(format!(
            "Route '{route}' is missing access assignment."
        )));
    };
    policy.evaluate(ctx)?;

    let mut input = Map::new();

    if let Some(schema) = route.params_schema() {
        let raw: Map<String, Value> = resolved
            .params
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        let params = validate(schema, Value::Object(raw), "Invalid request params").await?;
        merge(&mut input, "params", params);
    }

    if let Some(schema) = route.query_schema() {
        let query = validate(schema, body::query(parts.uri.query()), "Invalid request query").await?;
        merge(&mut input, "query", query);
    }

    if let Some(schema) = route.body_schema() {
        if parts.method != Method::GET && parts.method != Method::HEAD {
            let decoded = body::decode(&parts.headers, raw_body).await?;
            let body = validate(schema, decoded, "Invalid request body").await?;
            merge(&mut input, "body", body);
        }
    }

    pipeline::run(Invocation::Route { route, input }, ctx).await
}

/// Merges a validated stage into the handler input. Objects contribute their
/// fields; any other value is kept under the stage name.
fn merge(input: &mut Map<String, Value>, stage: &str, value: Value) {
    match value {
        Value::Object(fields) => input.extend(fields),
        Value::Null => {}
        other => {
            input.insert(stage.to_string(), other);
        }
    }
}
