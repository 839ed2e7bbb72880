//! Edge settings: where to listen and how the HTTP layers behave.

use std::time::Duration;

/// Settings for the listener and the HTTP layers around the dispatcher.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    /// 0 lets the OS pick a port; [`super::NetworkModule::start`] reports it.
    pub port: u16,
    /// `"*"` allows every origin.
    pub cors_origins: Vec<String>,
    /// Requests still running after this long are answered with 408.
    pub request_timeout: Duration,
}

impl NetworkConfig {
    /// `host:port` as handed to the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_everywhere_on_an_ephemeral_port() {
        let config = NetworkConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:0");
        assert!(config.allows_any_origin());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn explicit_origins_disable_the_wildcard() {
        let config = NetworkConfig {
            cors_origins: vec!["https://app.relay.test".to_string()],
            ..NetworkConfig::default()
        };
        assert!(!config.allows_any_origin());
    }
}
