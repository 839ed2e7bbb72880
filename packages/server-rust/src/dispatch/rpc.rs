//! RPC dispatch: parse the envelope, look the procedure up, validate params,
//! then the shared pipeline.

use bytes::Bytes;
use http::Response;
use relay_core::{RelayError, RelayIndex, RelayRequest, Reply, RequestContext};
use serde_json::json;
use tracing::debug;

use super::frame;
use super::pipeline::{self, validate, Invocation};

pub(crate) async fn handle(index: &RelayIndex, body: Bytes, ctx: &RequestContext) -> Response<Bytes> {
    let request: RelayRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "unreadable relay envelope");
            let err = RelayError::bad_request("Invalid relay request").with_data(json!({ "reason": e.to_string() }));
            return frame::rpc(Err(err), None, ctx);
        }
    };

    let id = request.id.clone();
    debug!(method = %request.method, %id, "rpc call");
    let result = run(index, request, ctx).await;
    frame::rpc(result, Some(id), ctx)
}

async fn run(index: &RelayIndex, request: RelayRequest, ctx: &RequestContext) -> Result<Reply, RelayError> {
    let Some(procedure) = index.procedure(&request.method) else {
        return Err(RelayError::not_found(format!(
            "Method '{}' does not exist",
            request.method
        )));
    };

    let params = match procedure.params_schema() {
        Some(schema) => {
            let Some(raw) = request.params else {
                return Err(RelayError::bad_request("Procedure expected params but got none"));
            };
            Some(validate(schema, raw, "Invalid request params").await?)
        }
        None => None,
    };

    pipeline::run(Invocation::Procedure { procedure, params }, ctx).await
}
