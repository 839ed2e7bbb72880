//! Wire envelopes for both transport styles.
//!
//! RPC: `{"relay":"1.0","method":..,"params":..,"id":..}` answered by
//! `{"relay":"1.0","result":..,"id":..}` or `{"relay":"1.0","error":{..},"id":..}`.
//!
//! REST: `{"data":..}` or `{"error":{..}}`.

use std::fmt;

use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{ErrorJson, RelayError};

/// Protocol version carried in every RPC envelope.
pub const RELAY_VERSION: &str = "1.0";

/// Content type of every framed JSON body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// The `relay` version marker. Serializes as `"1.0"` and rejects anything else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(RELAY_VERSION)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == RELAY_VERSION {
            Ok(Version)
        } else {
            Err(de::Error::invalid_value(Unexpected::Str(&raw), &"\"1.0\""))
        }
    }
}

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Correlation id of an RPC call. Either a string or a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id.into())
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC envelopes
// ---------------------------------------------------------------------------

/// Incoming RPC call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub relay: Version,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl RelayRequest {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<RequestId>) -> Self {
        Self {
            relay: Version,
            method: method.into(),
            params,
            id: id.into(),
        }
    }
}

/// Either half of an RPC answer. Flattened into [`RelayResponse`] as a
/// `result` or `error` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayOutcome {
    Result(Value),
    Error(ErrorJson),
}

/// Outgoing RPC answer. `id` is `null` only when the request envelope itself
/// could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub relay: Version,
    #[serde(flatten)]
    pub outcome: RelayOutcome,
    pub id: Option<RequestId>,
}

impl RelayResponse {
    #[must_use]
    pub fn success(result: Value, id: Option<RequestId>) -> Self {
        Self {
            relay: Version,
            outcome: RelayOutcome::Result(result),
            id,
        }
    }

    #[must_use]
    pub fn failure(error: &RelayError, id: Option<RequestId>) -> Self {
        Self {
            relay: Version,
            outcome: RelayOutcome::Error(error.to_json()),
            id,
        }
    }

    /// Splits the envelope into a `Result`, reconstructing errors through the taxonomy.
    ///
    /// # Errors
    ///
    /// Returns the reconstructed [`RelayError`] when the envelope carries an error.
    pub fn into_result(self) -> Result<Value, RelayError> {
        match self.outcome {
            RelayOutcome::Result(value) => Ok(value),
            RelayOutcome::Error(json) => Err(RelayError::from_json(json)),
        }
    }
}

// ---------------------------------------------------------------------------
// REST envelope
// ---------------------------------------------------------------------------

/// REST body: `{"data": ..}` on success, `{"error": {..}}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestEnvelope {
    Data(Value),
    Error(ErrorJson),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
