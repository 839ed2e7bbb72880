//! Relay client: turns route and procedure declarations into typed calls.
//!
//! ```text
//! RelayClient ─ RouteCall / ProcedureCall ─ RelayAdapter ─ Transport
//! ```

pub mod adapter;
pub mod client;
pub mod decode;
pub mod encode;
pub mod error;
pub mod transport;

pub use adapter::{HeaderHook, HttpAdapterConfig, RelayAdapter, RelayInput};
pub use client::{CallArgs, ProcedureCall, RelayClient, RouteCall};
pub use decode::{decode, RelayResult, ResponseError};
pub use encode::file;
pub use error::ClientError;
pub use transport::{HttpTransport, RequestBody, ServiceTransport, Transport, TransportRequest, TransportResponse};
