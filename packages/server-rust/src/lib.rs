//! Relay server: REST and RPC dispatch over a relay index, served by axum.

pub mod config;
pub mod demo;
pub mod dispatch;
pub mod logging;
pub mod network;
pub mod service;
pub mod session;

pub use config::{LogFormat, ServerConfig};
pub use dispatch::{DispatchConfig, DispatchKind, Dispatcher};
pub use network::{NetworkConfig, NetworkModule};
pub use service::RelayService;
pub use session::{NoSessions, SessionResolver};
