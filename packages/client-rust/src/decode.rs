//! Response normalization.
//!
//! Whatever the server sent, a REST call ends as a [`RelayResult`]: success
//! with data, or an error that is either a reconstructed taxonomy member or
//! a synthetic client-side error.

use std::fmt;

use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use relay_core::{ErrorJson, RelayError};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::transport::TransportResponse;

/// Media type of SCIM responses, which carry errors in a `detail` field.
pub const SCIM_CONTENT_TYPE: &str = "application/scim+json";

// ---------------------------------------------------------------------------
// RelayResult
// ---------------------------------------------------------------------------

/// Normalized outcome of a REST call. Serializes as
/// `{"result":"success","data":..}` or `{"result":"error","error":{..}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum RelayResult<T = Value> {
    Success { data: T },
    Error { error: ResponseError },
}

impl<T> RelayResult<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data } => Some(data),
            Self::Error { .. } => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ResponseError> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error } => Some(error),
        }
    }

    /// # Errors
    ///
    /// Returns the response error when the call failed.
    pub fn into_result(self) -> Result<T, ResponseError> {
        match self {
            Self::Success { data } => Ok(data),
            Self::Error { error } => Err(error),
        }
    }

    fn client_error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ResponseError::Client {
                status: status.as_u16(),
                message: message.into(),
            },
        }
    }
}

/// Error half of a [`RelayResult`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResponseError {
    /// A well-formed relay error frame, rebuilt through the taxonomy.
    #[error(transparent)]
    Server(RelayError),
    /// The response could not be read as a relay frame.
    #[error("{message}")]
    Client { status: u16, message: String },
}

impl ResponseError {
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Server(error) => error.status(),
            Self::Client { status, .. } => *status,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Server(error) => error.message(),
            Self::Client { message, .. } => message,
        }
    }
}

impl ResponseError {
    /// Wire shape of the error, `{status, message, data?}`.
    #[must_use]
    pub fn to_json(&self) -> ErrorJson {
        match self {
            Self::Server(error) => error.to_json(),
            Self::Client { status, message } => ErrorJson {
                status: *status,
                message: message.clone(),
                data: None,
            },
        }
    }
}

impl Serialize for ResponseError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for RelayResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { data } => write!(f, "success: {data}"),
            Self::Error { error } => write!(f, "error {}: {}", error.status(), error.message()),
        }
    }
}

// ---------------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------------

/// Normalizes a raw response. Rules apply in order:
///
/// 1. no `content-type`: error
/// 2. `204`: success with `null`
/// 3. SCIM: `status >= 400` is an error carrying `detail`, else success
/// 4. any JSON type: `data` key is success, `error` key is a taxonomy error
/// 5. anything else: error
#[must_use]
pub fn decode(response: &TransportResponse) -> RelayResult {
    let status = response.status;

    let Some(content_type) = content_type(&response.headers) else {
        return RelayResult::client_error(status, "Missing 'content-type' in header returned from server.");
    };

    if status == StatusCode::NO_CONTENT {
        return RelayResult::Success { data: Value::Null };
    }

    if essence(content_type) == SCIM_CONTENT_TYPE {
        let parsed = match parse(response) {
            Ok(parsed) => parsed,
            Err(result) => return result,
        };
        if status.as_u16() >= 400 {
            let detail = parsed.get("detail").and_then(Value::as_str).unwrap_or_default();
            return RelayResult::client_error(status, detail);
        }
        return RelayResult::Success { data: parsed };
    }

    if content_type.contains("json") {
        let parsed = match parse(response) {
            Ok(parsed) => parsed,
            Err(result) => return result,
        };
        if let Some(data) = parsed.get("data") {
            return RelayResult::Success { data: data.clone() };
        }
        if let Some(error) = parsed.get("error") {
            return RelayResult::Error {
                error: to_error(error, status),
            };
        }
        return RelayResult::client_error(
            status,
            "Unsupported 'json' body returned from server, missing 'data' or 'error' key.",
        );
    }

    RelayResult::client_error(status, "Unsupported 'content-type' in header returned from server.")
}

pub(crate) fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Media type without parameters, lowercased.
pub(crate) fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn parse(response: &TransportResponse) -> Result<Value, RelayResult> {
    serde_json::from_slice(&response.body).map_err(|e| {
        debug!(error = %e, "unreadable JSON response");
        RelayResult::client_error(response.status, "Malformed 'json' body returned from server.")
    })
}

fn to_error(candidate: &Value, status: StatusCode) -> ResponseError {
    if let Ok(json) = serde_json::from_value::<ErrorJson>(candidate.clone()) {
        return ResponseError::Server(RelayError::from_json(json));
    }
    let message = match candidate {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    };
    ResponseError::Client {
        status: status.as_u16(),
        message,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::HeaderValue;
    use relay_core::ErrorKind;
    use serde_json::json;

    use super::*;

    fn response(status: u16, content_type: Option<&'static str>, body: &'static str) -> TransportResponse {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        TransportResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn missing_content_type_is_an_error_even_for_204() {
        let result = decode(&response(204, None, ""));
        assert_eq!(result.error().unwrap().status(), 204);
        assert!(result.error().unwrap().message().contains("content-type"));
    }

    #[test]
    fn no_content_is_null_success() {
        let result = decode(&response(204, Some("application/json"), ""));
        assert_eq!(result, RelayResult::Success { data: Value::Null });
    }

    #[test]
    fn scim_errors_use_detail() {
        let result = decode(&response(
            409,
            Some("application/scim+json"),
            r#"{"detail":"User exists","status":"409"}"#,
        ));
        assert_eq!(
            result,
            RelayResult::Error {
                error: ResponseError::Client {
                    status: 409,
                    message: "User exists".to_string()
                }
            }
        );

        let result = decode(&response(200, Some("application/scim+json"), r#"{"id":"1"}"#));
        assert_eq!(result.data(), Some(&json!({ "id": "1" })));
    }

    #[test]
    fn json_data_and_error_frames() {
        let result = decode(&response(200, Some("application/json"), r#"{"data":{"id":1}}"#));
        assert_eq!(result.data(), Some(&json!({ "id": 1 })));

        let result = decode(&response(
            404,
            Some("application/json; charset=utf-8"),
            r#"{"error":{"status":404,"message":"User not found","data":{"id":"1"}}}"#,
        ));
        let ResponseError::Server(error) = result.into_result().unwrap_err() else {
            panic!("expected a taxonomy error");
        };
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.message(), "User not found");
        assert_eq!(error.data(), Some(&json!({ "id": "1" })));
    }

    #[test]
    fn json_without_known_key_is_unsupported_shape() {
        let result = decode(&response(200, Some("application/json"), r#"{"value":1}"#));
        assert!(result.error().unwrap().message().contains("missing 'data' or 'error'"));
    }

    #[test]
    fn other_content_types_are_unsupported() {
        let result = decode(&response(200, Some("text/html"), "<html></html>"));
        assert_eq!(
            result.error().unwrap().message(),
            "Unsupported 'content-type' in header returned from server."
        );
    }

    #[test]
    fn results_serialize_with_a_result_tag() {
        let success = decode(&response(204, Some("application/json"), ""));
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            json!({ "result": "success", "data": null })
        );

        let failure = decode(&response(
            403,
            Some("application/json"),
            r#"{"error":{"status":403,"message":"Forbidden"}}"#,
        ));
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({ "result": "error", "error": { "status": 403, "message": "Forbidden" } })
        );
    }

    #[test]
    fn string_error_is_kept_as_client_error() {
        let result = decode(&response(502, Some("application/json"), r#"{"error":"upstream down"}"#));
        assert_eq!(
            result.into_result().unwrap_err(),
            ResponseError::Client {
                status: 502,
                message: "upstream down".to_string()
            }
        );
    }
}
