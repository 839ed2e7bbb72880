//! Relay core: error taxonomy, wire envelopes, schemas, and the route and
//! procedure declarations shared by the server and client.

pub mod access;
pub mod action;
pub mod catalog;
pub mod context;
pub mod error;
pub mod handler;
pub mod index;
pub mod path;
pub mod procedure;
pub mod route;
pub mod schema;
pub mod wire;

pub use access::{AccessCheck, AccessPolicy};
pub use action::{Action, ActionScope, ActionStep};
pub use catalog::{Catalog, CatalogBuilder};
pub use context::{RequestContext, RequestContextBuilder, Session};
pub use error::{ErrorJson, ErrorKind, RegistryError, RelayError};
pub use handler::{ProcedureContext, RawResponse, Reply, RouteContext};
pub use index::{Entry, RelayIndex, Resolution, ResolvedRoute};
pub use path::PathPattern;
pub use procedure::Procedure;
pub use route::{ContentKind, Route};
pub use schema::{JsonSchema, Schema, SchemaError, SchemaRef, ValidationReport};
pub use wire::{RelayOutcome, RelayRequest, RelayResponse, RequestId, RestEnvelope};
