//! Bootstrap configuration for fusewatt
//!
//! This is process-deployment configuration — HTTP bind address, the dynamic
//! config file path, Modbus timeout defaults, logging — loaded once at
//! startup. It is distinct from the [`crate::dynconfig`] document: bootstrap
//! config describes how the process is deployed, the dynamic document
//! describes what it currently controls, and only the latter is reachable
//! through the HTTP API.

use crate::error::{FusewattError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server binding configuration
    pub web: WebConfig,

    /// Path to the dynamic (HTTP-managed) configuration document
    pub dynamic_config_path: String,

    /// Modbus connection defaults
    pub modbus: ModbusDefaults,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Web server binding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,

    /// Directory serving the operator web UI's static assets
    pub static_dir: String,
}

/// Modbus client defaults (§4.9, §5 timeouts)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusDefaults {
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Reconnect delay in seconds (§9: normalised from the source's `"10.0"` literal)
    pub reconnect_delay_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Directory holding daily-rolling log files
    pub directory: String,

    /// Whether to also log to stdout
    pub console_output: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8099,
            static_dir: "./webui".to_string(),
        }
    }
}

impl Default for ModbusDefaults {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 5,
            reconnect_delay_seconds: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            directory: "/tmp/fusewatt/logs".to_string(),
            console_output: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            dynamic_config_path: "/data/fusewatt_config.json".to_string(),
            modbus: ModbusDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, trying default search paths, falling back to built-in defaults
    pub fn load() -> Result<Self> {
        let default_paths = [
            "fusewatt.yaml",
            "/data/fusewatt.yaml",
            "/etc/fusewatt/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.web.port == 0 {
            return Err(FusewattError::config("web.port must be greater than 0"));
        }
        if self.modbus.request_timeout_seconds == 0 {
            return Err(FusewattError::config(
                "modbus.request_timeout_seconds must be greater than 0",
            ));
        }
        if self.dynamic_config_path.is_empty() {
            return Err(FusewattError::config(
                "dynamic_config_path must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.web.port, 8099);
        assert_eq!(config.modbus.reconnect_delay_seconds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_falls_back_to_defaults_when_absent() {
        // No fusewatt.yaml is expected to exist in the test working directory.
        let config = Config::load().unwrap();
        assert_eq!(config.web.host, "0.0.0.0");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.web.port, deserialized.web.port);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut config = Config::default();
        config.web.port = 0;
        assert!(config.validate().is_err());
    }
}
