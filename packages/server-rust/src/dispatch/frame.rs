//! Response framing for both transport styles.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use relay_core::wire::JSON_CONTENT_TYPE;
use relay_core::{Reply, RelayError, RelayResponse, RequestContext, RequestId, RestEnvelope};
use serde::Serialize;
use tracing::error;

/// Frames a REST outcome. `head` suppresses every body while keeping status
/// and headers.
pub(crate) fn rest(result: Result<Reply, RelayError>, head: bool, ctx: &RequestContext) -> Response<Bytes> {
    let response = match result {
        Ok(Reply::Data(value)) => json(StatusCode::OK, &RestEnvelope::Data(value)),
        Ok(Reply::Empty) => {
            let status = if head { StatusCode::OK } else { StatusCode::NO_CONTENT };
            empty(status)
        }
        Ok(Reply::Raw(raw)) => raw,
        Err(err) => json(err.kind().status_code(), &RestEnvelope::Error(err.to_json())),
    };
    finish(response, head, ctx)
}

/// Frames an RPC outcome. Success is always HTTP 200; failures carry the
/// error's status.
pub(crate) fn rpc(result: Result<Reply, RelayError>, id: Option<RequestId>, ctx: &RequestContext) -> Response<Bytes> {
    let response = match result {
        Ok(Reply::Data(value)) => json(StatusCode::OK, &RelayResponse::success(value, id)),
        Ok(Reply::Empty) => json(StatusCode::OK, &RelayResponse::success(serde_json::Value::Null, id)),
        Ok(Reply::Raw(raw)) => raw,
        Err(err) => json(err.kind().status_code(), &RelayResponse::failure(&err, id)),
    };
    finish(response, false, ctx)
}

fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<Bytes> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, Bytes::from(bytes)),
        Err(e) => {
            error!(error = %e, "response envelope could not be serialized");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":{"status":500,"message":"Internal Server Error"}}"#),
            )
        }
    };
    let mut response = Response::new(bytes);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

/// Bodiless response, still typed as JSON.
fn empty(status: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

fn finish(mut response: Response<Bytes>, head: bool, ctx: &RequestContext) -> Response<Bytes> {
    for (name, value) in &ctx.response_headers() {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    if head {
        *response.body_mut() = Bytes::new();
    }
    response
}
