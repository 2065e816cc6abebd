//! Configuration management for RelayChain

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_enabled")]
    pub api_enabled: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            ws_port: default_ws_port(),
            api_port: default_api_port(),
            api_enabled: default_enabled(),
        }
    }
}

impl CoordinatorConfig {
    pub fn ws_bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.ws_port)
    }

    pub fn api_bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.api_port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    #[serde(default = "default_coordinator_url")]
    pub coordinator_url: String,
    #[serde(default = "default_enabled")]
    pub offload_mining: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            coordinator_url: default_coordinator_url(),
            offload_mining: default_enabled(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

/// Load `./config.toml`, falling back to defaults when it is absent.
pub fn load_config() -> Result<Config> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    parse_config(&config_str)
}

/// Load a configuration file that must exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        ChainError::ConfigError(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_config(&config_str)
}

/// Parse and validate configuration text. Empty text yields the defaults.
pub fn parse_config(config_str: &str) -> Result<Config> {
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(config_str)?
    };
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let url = &self.producer.coordinator_url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ChainError::ConfigError(format!(
                "producer.coordinator_url must be a ws:// or wss:// URL, got {:?}",
                url
            )));
        }

        let c = &self.coordinator;
        if c.api_enabled && c.ws_port != 0 && c.ws_port == c.api_port {
            return Err(ChainError::ConfigError(format!(
                "coordinator.ws_port and coordinator.api_port must differ (both {})",
                c.ws_port
            )));
        }

        if self.logging.filter.trim().is_empty() {
            return Err(ChainError::ConfigError("logging.filter must not be empty".to_string()));
        }

        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_ws_port() -> u16 {
    3000
}

fn default_api_port() -> u16 {
    3001
}

fn default_enabled() -> bool {
    true
}

fn default_coordinator_url() -> String {
    "ws://localhost:3000".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.coordinator.ws_port, 3000);
        assert_eq!(config.coordinator.api_port, 3001);
        assert!(config.coordinator.api_enabled);
        assert_eq!(config.producer.coordinator_url, "ws://localhost:3000");
        assert!(config.producer.offload_mining);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.coordinator.ws_bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_partial_config_fills_missing_keys() {
        let config = parse_config(
            r#"
            [coordinator]
            ws_port = 4000

            [producer]
            offload_mining = false
            "#,
        )
        .unwrap();
        assert_eq!(config.coordinator.ws_port, 4000);
        assert_eq!(config.coordinator.api_port, 3001);
        assert_eq!(config.coordinator.host, "0.0.0.0");
        assert!(!config.producer.offload_mining);
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        let err = parse_config(
            r#"
            [producer]
            coordinator_url = "http://localhost:3000"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_port_clash() {
        let err = parse_config(
            r#"
            [coordinator]
            ws_port = 5000
            api_port = 5000
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::ConfigError(_)));

        // No clash when the API is off.
        let ok = parse_config(
            r#"
            [coordinator]
            ws_port = 5000
            api_port = 5000
            api_enabled = false
            "#,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(parse_config("[coordinator"), Err(ChainError::ConfigError(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nfilter = \"relaychain=debug\"").unwrap();

        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.logging.filter, "relaychain=debug");
    }

    #[test]
    fn test_load_config_from_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(load_config_from(missing), Err(ChainError::ConfigError(_))));
    }
}
