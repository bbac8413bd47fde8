//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name used in logs and banners
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Public IP advertised in the shard list
    #[serde(default = "default_public_ip")]
    pub public_ip: String,

    /// HTTP port (web login, shard list, health)
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Custom1 binary-protocol ports (login, lobby, persona)
    #[serde(default = "default_custom1_ports")]
    pub custom1_ports: Vec<u16>,

    /// Custom2 binary-protocol port (stub)
    #[serde(default = "default_custom2_port")]
    pub custom2_port: u16,

    /// Path to the SQLite credential database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Path to the RSA private key PEM file
    #[serde(default = "default_private_key_path")]
    pub private_key_path: PathBuf,

    /// Deadline for the single request read, in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

// Default value functions
fn default_server_name() -> String {
    "Lotus".to_string()
}

fn default_public_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_custom1_ports() -> Vec<u16> {
    vec![8226, 8228, 7003]
}

fn default_custom2_port() -> u16 {
    43300
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/lotus.db")
}

fn default_private_key_path() -> PathBuf {
    PathBuf::from("data/private_key.pem")
}

fn default_read_timeout_ms() -> u64 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            public_ip: default_public_ip(),
            http_port: default_http_port(),
            custom1_ports: default_custom1_ports(),
            custom2_port: default_custom2_port(),
            database_path: default_database_path(),
            private_key_path: default_private_key_path(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("LOTUS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        // Try to load from file
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            toml::from_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        // Override with environment variables
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("LOTUS_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("LOTUS_PUBLIC_IP") {
            self.public_ip = val;
        }
        if let Ok(val) = env::var("LOTUS_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                self.http_port = port;
            }
        }
        if let Ok(val) = env::var("LOTUS_CUSTOM1_PORTS") {
            let ports: Vec<u16> = val
                .split(',')
                .filter_map(|p| p.trim().parse().ok())
                .collect();
            if !ports.is_empty() {
                self.custom1_ports = ports;
            }
        }
        if let Ok(val) = env::var("LOTUS_CUSTOM2_PORT") {
            if let Ok(port) = val.parse() {
                self.custom2_port = port;
            }
        }
        if let Ok(val) = env::var("LOTUS_DATABASE_PATH") {
            self.database_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("LOTUS_PRIVATE_KEY_PATH") {
            self.private_key_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("LOTUS_READ_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.read_timeout_ms = timeout;
            }
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.custom1_ports.is_empty() {
            anyhow::bail!("At least one Custom1 port must be configured");
        }

        // Every listener needs its own port. Port 0 (ephemeral) is exempt so
        // tests can bind wherever the OS pleases.
        let mut seen = HashSet::new();
        let all_ports = std::iter::once(self.http_port)
            .chain(self.custom1_ports.iter().copied())
            .chain(std::iter::once(self.custom2_port));
        for port in all_ports {
            if port != 0 && !seen.insert(port) {
                anyhow::bail!("Port {} is assigned to more than one listener", port);
            }
        }

        if self.read_timeout_ms == 0 || self.read_timeout_ms > 60_000 {
            anyhow::bail!("Read timeout must be between 1ms and 60000ms");
        }

        Ok(())
    }

    /// Read deadline as a `Duration`
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server_name, "Lotus");
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.custom1_ports, vec![8226, 8228, 7003]);
        assert_eq!(config.custom2_port, 43300);
        assert_eq!(config.database_path, PathBuf::from("data/lotus.db"));
        assert_eq!(config.read_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // No Custom1 ports
        config.custom1_ports.clear();
        assert!(config.validate().is_err());
        config.custom1_ports = default_custom1_ports();

        // Duplicate ports
        config.http_port = 8226;
        assert!(config.validate().is_err());
        config.http_port = 3000;

        // Duplicates inside the Custom1 list
        config.custom1_ports = vec![8226, 8226];
        assert!(config.validate().is_err());
        config.custom1_ports = default_custom1_ports();

        // Timeout bounds
        config.read_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ephemeral_ports_allowed() {
        let config = ServerConfig {
            http_port: 0,
            custom1_ports: vec![0, 0],
            custom2_port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            server_name = "Lotus West"
            http_port = 8080
            custom1_ports = [9001, 9002]
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server_name, "Lotus West");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.custom1_ports, vec![9001, 9002]);
        // Unspecified fields fall back to defaults.
        assert_eq!(config.custom2_port, 43300);
    }
}
