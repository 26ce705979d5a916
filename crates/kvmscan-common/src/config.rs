//! Run configuration for kvmscan
//!
//! This is the tool's own tuning (timeouts, concurrency, logging). The
//! vendor indicator document is loaded separately by `kvmscan-indicators`.

use kvmscan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Probe and matching settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Merge with environment variables (KVMSCAN_ prefix)
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = var("KVMSCAN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = var("KVMSCAN_LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Some(val) = var("KVMSCAN_MDNS_MODE") {
            if let Ok(mode) = val.parse() {
                self.scan.mdns_mode = mode;
            }
        }
        if let Some(val) = var("KVMSCAN_HTTP_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.scan.http_concurrency = n;
            }
        }
        self
    }
}

/// How mDNS names are resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MdnsMode {
    /// Send multicast queries from a local socket
    #[default]
    Native,
    /// Ask the platform resolver command; opens no sockets
    Subprocess,
}

impl FromStr for MdnsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(MdnsMode::Native),
            "subprocess" => Ok(MdnsMode::Subprocess),
            other => Err(Error::Configuration(format!("unknown mdns mode: {}", other))),
        }
    }
}

/// Probe and matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Per-domain mDNS resolution bound
    #[serde(default = "default_mdns_timeout")]
    pub mdns_timeout_seconds: u64,

    /// Whole-request bound for HTTP fetches
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,

    /// TCP connect bound for TLS dials and HTTP requests
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Bound for external enumeration commands (arp, lsusb, ioreg)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,

    /// Maximum HTTP targets probed at once
    #[serde(default = "default_http_concurrency")]
    pub http_concurrency: usize,

    /// mDNS resolution strategy
    #[serde(default)]
    pub mdns_mode: MdnsMode,

    /// User agent sent with HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Addresses never taken from the ARP table (multicast, metadata service)
    #[serde(default = "default_excluded_ips")]
    pub excluded_ips: Vec<String>,
}

fn default_mdns_timeout() -> u64 {
    3
}

fn default_http_timeout() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    3
}

fn default_command_timeout() -> u64 {
    10
}

fn default_http_concurrency() -> usize {
    16
}

fn default_user_agent() -> String {
    format!("kvmscan/{}", env!("CARGO_PKG_VERSION"))
}

fn default_excluded_ips() -> Vec<String> {
    vec![
        String::from("224.0.0.251"),
        String::from("239.255.255.250"),
        String::from("169.254.169.254"),
    ]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mdns_timeout_seconds: default_mdns_timeout(),
            http_timeout_seconds: default_http_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            command_timeout_seconds: default_command_timeout(),
            http_concurrency: default_http_concurrency(),
            mdns_mode: MdnsMode::default(),
            user_agent: default_user_agent(),
            excluded_ips: default_excluded_ips(),
        }
    }
}

impl ScanConfig {
    pub fn mdns_timeout(&self) -> Duration {
        Duration::from_secs(self.mdns_timeout_seconds.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds.max(1))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("compact")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [scan]
            mdns_timeout_seconds = 5
            http_concurrency = 4
            mdns_mode = "subprocess"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.scan.mdns_timeout(), Duration::from_secs(5));
        assert_eq!(config.scan.http_concurrency, 4);
        assert_eq!(config.scan.mdns_mode, MdnsMode::Subprocess);
        assert_eq!(config.scan.http_timeout_seconds, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scan.mdns_timeout(), Duration::from_secs(3));
        assert_eq!(config.scan.mdns_mode, MdnsMode::Native);
        assert!(config
            .scan
            .excluded_ips
            .contains(&String::from("224.0.0.251")));
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = Config::from_toml("[scan\nmdns_timeout_seconds = ").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kvmscan.toml");
        std::fs::write(&path, "[scan]\nhttp_timeout_seconds = 9\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.scan.http_timeout(), Duration::from_secs(9));
    }

    #[test]
    fn test_merge_vars() {
        let vars: HashMap<&str, &str> = [
            ("KVMSCAN_LOG_LEVEL", "trace"),
            ("KVMSCAN_MDNS_MODE", "subprocess"),
            ("KVMSCAN_HTTP_CONCURRENCY", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().merge_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.scan.mdns_mode, MdnsMode::Subprocess);
        assert_eq!(config.scan.http_concurrency, 16);
    }
}
