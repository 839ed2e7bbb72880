//! Client-side errors.
//!
//! Server-reported failures are not errors at this level: REST calls return
//! them inside [`crate::RelayResult`], RPC calls as [`ClientError::Remote`].

use relay_core::path::MissingParam;
use relay_core::{RegistryError, RelayError, ValidationReport};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Arguments failed the declared schema before anything was sent.
    #[error("Invalid '{part}' passed to {endpoint} handler.")]
    InvalidArguments {
        part: &'static str,
        endpoint: String,
        report: ValidationReport,
    },

    /// A success payload failed the declared output or result schema.
    #[error("Invalid response returned from {endpoint}.")]
    InvalidResponse { endpoint: String, report: ValidationReport },

    #[error("no route or procedure named '{0}'")]
    UnknownEndpoint(String),

    #[error(transparent)]
    MissingParam(#[from] MissingParam),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The server answered an RPC call with an error envelope.
    #[error(transparent)]
    Remote(#[from] RelayError),

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ClientError {
    pub fn transport(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(error))
    }
}
