//! Error taxonomy shared by the dispatcher and the client.
//!
//! Every [`RelayError`] carries an [`ErrorKind`] (which fixes its HTTP status),
//! a message, and optional structured data. [`ErrorJson`] is the canonical
//! wire representation; the status code is the discriminant used when an error
//! is reconstructed on the far side of the network boundary.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Generates `ErrorKind` together with its status table, default messages,
/// and the matching `RelayError` shorthand constructors.
macro_rules! taxonomy {
    (
        $(
            $(#[$meta:meta])*
            $kind:ident => $status:literal, $message:literal, $ctor:ident;
        )+
    ) => {
        /// Closed set of error kinds understood on both sides of the wire.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorKind {
            $(
                $(#[$meta])*
                $kind,
            )+
        }

        impl ErrorKind {
            /// Every taxonomy member, in ascending status order.
            pub const ALL: &'static [ErrorKind] = &[$(ErrorKind::$kind),+];

            /// Canonical HTTP status code of this kind.
            #[must_use]
            pub const fn status(self) -> u16 {
                match self {
                    $(ErrorKind::$kind => $status,)+
                }
            }

            /// Message used when an error is created without one.
            #[must_use]
            pub const fn default_message(self) -> &'static str {
                match self {
                    $(ErrorKind::$kind => $message,)+
                }
            }

            /// Maps a status code back to its kind. `None` for codes outside the taxonomy.
            #[must_use]
            pub const fn from_status(status: u16) -> Option<Self> {
                match status {
                    $($status => Some(ErrorKind::$kind),)+
                    _ => None,
                }
            }
        }

        impl RelayError {
            $(
                #[doc = concat!("Creates a `", stringify!($kind), "` error (HTTP ", stringify!($status), ").")]
                #[must_use]
                pub fn $ctor(message: impl Into<String>) -> Self {
                    Self::with_message(ErrorKind::$kind, message)
                }
            )+
        }
    };
}

taxonomy! {
    /// The request is malformed or failed validation.
    BadRequest => 400, "Bad Request", bad_request;
    /// The request lacks valid authentication.
    Unauthorized => 401, "Unauthorized", unauthorized;
    /// The caller is authenticated but not allowed.
    Forbidden => 403, "Forbidden", forbidden;
    /// No resource (route, procedure, record) matches.
    NotFound => 404, "Not Found", not_found;
    /// The request verb is not served.
    MethodNotAllowed => 405, "Method Not Allowed", method_not_allowed;
    /// No acceptable representation can be produced.
    NotAcceptable => 406, "Not Acceptable", not_acceptable;
    /// The request conflicts with current state.
    Conflict => 409, "Conflict", conflict;
    /// The resource existed but is permanently gone.
    Gone => 410, "Gone", gone;
    /// The request body media type is not supported.
    UnsupportedMediaType => 415, "Unsupported Media Type", unsupported_media_type;
    /// The request was understood but cannot be processed.
    UnprocessableContent => 422, "Unprocessable Content", unprocessable_content;
    /// Unexpected server-side failure or configuration defect.
    InternalServerError => 500, "Internal Server Error", internal;
    /// The server is temporarily unable to handle the request.
    ServiceUnavailable => 503, "Service Unavailable", service_unavailable;
}

impl ErrorKind {
    /// Status as an `http::StatusCode`.
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

// ---------------------------------------------------------------------------
// RelayError
// ---------------------------------------------------------------------------

/// A typed error from the taxonomy.
///
/// Handlers and actions return it (usually through `anyhow`) to stop the
/// pipeline with a specific status; the dispatcher frames it as-is.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RelayError {
    kind: ErrorKind,
    message: String,
    data: Option<Value>,
}

impl RelayError {
    /// Creates an error of the given kind with its default message.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self::with_message(kind, kind.default_message())
    }

    /// Creates an error of the given kind with a custom message.
    #[must_use]
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured data. `null` is treated as no data.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        let data = data.into();
        self.data = if data.is_null() { None } else { Some(data) };
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Serializes into the wire representation.
    #[must_use]
    pub fn to_json(&self) -> ErrorJson {
        ErrorJson {
            status: self.status(),
            message: self.message.clone(),
            data: self.data.clone(),
        }
    }

    /// Reconstructs an error from its wire representation.
    ///
    /// The status selects the kind; a status outside the taxonomy becomes
    /// `InternalServerError` while keeping the message and data.
    #[must_use]
    pub fn from_json(json: ErrorJson) -> Self {
        let kind = ErrorKind::from_status(json.status).unwrap_or(ErrorKind::InternalServerError);
        Self {
            kind,
            message: json.message,
            data: json.data.filter(|data| !data.is_null()),
        }
    }
}

impl From<ErrorKind> for RelayError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<ErrorJson> for RelayError {
    fn from(json: ErrorJson) -> Self {
        Self::from_json(json)
    }
}

impl From<&RelayError> for ErrorJson {
    fn from(error: &RelayError) -> Self {
        error.to_json()
    }
}

// ---------------------------------------------------------------------------
// ErrorJson
// ---------------------------------------------------------------------------

/// Canonical cross-boundary error shape: `{status, message, data?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorJson {
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Configuration errors raised while declarations are registered or looked up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("route '{method} {path}' already exists")]
    DuplicateRoute { method: String, path: String },
    #[error("procedure '{method}' already exists")]
    DuplicateProcedure { method: String },
    #[error("catalog entry '{name}' already exists")]
    DuplicateName { name: String },
    #[error("invalid path pattern '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("unsupported route method '{method}'")]
    UnsupportedMethod { method: String },
    #[error("no declaration registered for '{key}'")]
    UnknownDeclaration { key: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn every_member_round_trips_through_json() {
        for &kind in ErrorKind::ALL {
            let original = RelayError::with_message(kind, format!("failed with {}", kind.status()))
                .with_data(json!({ "field": ["is required"] }));

            let wire = serde_json::to_string(&original.to_json()).unwrap();
            let decoded: ErrorJson = serde_json::from_str(&wire).unwrap();
            let rebuilt = RelayError::from_json(decoded);

            assert_eq!(rebuilt, original, "round trip failed for {kind:?}");
        }
    }

    #[test]
    fn default_messages_survive_round_trip() {
        for &kind in ErrorKind::ALL {
            let original = RelayError::new(kind);
            assert_eq!(original.message(), kind.default_message());
            assert_eq!(RelayError::from_json(original.to_json()), original);
        }
    }

    #[test]
    fn unknown_status_reconstructs_as_internal() {
        let rebuilt = RelayError::from_json(ErrorJson {
            status: 418,
            message: "teapot".to_string(),
            data: Some(json!({ "brew": false })),
        });
        assert_eq!(rebuilt.kind(), ErrorKind::InternalServerError);
        assert_eq!(rebuilt.status(), 500);
        assert_eq!(rebuilt.message(), "teapot");
        assert_eq!(rebuilt.data(), Some(&json!({ "brew": false })));
    }

    #[test]
    fn data_is_omitted_from_wire_when_absent() {
        let wire = serde_json::to_value(RelayError::not_found("missing").to_json()).unwrap();
        assert_eq!(wire, json!({ "status": 404, "message": "missing" }));
    }

    #[test]
    fn null_data_is_normalized_to_none() {
        let error = RelayError::conflict("taken").with_data(Value::Null);
        assert!(error.data().is_none());
    }

    #[test]
    fn statuses_match_taxonomy_table() {
        let table: Vec<u16> = ErrorKind::ALL.iter().map(|kind| kind.status()).collect();
        assert_eq!(
            table,
            vec![400, 401, 403, 404, 405, 406, 409, 410, 415, 422, 500, 503]
        );
        assert_eq!(ErrorKind::Gone.status_code(), StatusCode::GONE);
    }

    #[test]
    fn display_uses_message() {
        let error = RelayError::forbidden("no access to billing");
        assert_eq!(error.to_string(), "no access to billing");
    }
}
