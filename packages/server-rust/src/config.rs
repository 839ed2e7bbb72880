//! Server configuration: command-line flags with environment fallbacks.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::dispatch::DispatchConfig;
use crate::network::NetworkConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, multi-line.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Relay server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "test-server", about = "Relay dispatch server", long_about = None)]
pub struct ServerConfig {
    /// Bind address.
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on. 0 picks a free port.
    #[arg(long, env = "RELAY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path that RPC envelopes are posted to.
    #[arg(long, env = "RELAY_RPC_PATH", default_value = "/rpc")]
    pub rpc_path: String,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "RELAY_BODY_LIMIT", default_value_t = 2 * 1024 * 1024)]
    pub body_limit: usize,

    /// Maximum time a request may take, in seconds.
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Allowed CORS origin. Repeat for several; `*` allows any.
    #[arg(long = "cors-origin", default_values_t = ["*".to_string()])]
    pub cors_origins: Vec<String>,

    /// Log output format.
    #[arg(long, env = "RELAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Network settings: bind address, CORS, and request timeout.
    #[must_use]
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Dispatcher settings: RPC path and body limit.
    #[must_use]
    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            rpc_path: self.rpc_path.clone(),
            body_limit: self.body_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_defaults() {
        let config = ServerConfig::parse_from(["test-server"]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Pretty);

        let network = config.network();
        let defaults = NetworkConfig::default();
        assert_eq!(network.host, defaults.host);
        assert_eq!(network.cors_origins, defaults.cors_origins);
        assert_eq!(network.request_timeout, defaults.request_timeout);

        let dispatch = config.dispatch();
        assert_eq!(dispatch.rpc_path, DispatchConfig::default().rpc_path);
        assert_eq!(dispatch.body_limit, DispatchConfig::default().body_limit);
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::parse_from([
            "test-server",
            "--port",
            "0",
            "--rpc-path",
            "/relay",
            "--cors-origin",
            "https://a.fixture.none",
            "--cors-origin",
            "https://b.fixture.none",
            "--log-format",
            "json",
        ]);
        assert_eq!(config.port, 0);
        assert_eq!(config.dispatch().rpc_path, "/relay");
        assert_eq!(config.network().cors_origins.len(), 2);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
