//! Networking: configuration, HTTP middleware, and the server lifecycle.

pub mod config;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use middleware::{build_http_layers, REQUEST_ID_HEADER};
pub use module::NetworkModule;
