//! kvmscan WebApp - HTTP/TLS fingerprint collection
//!
//! This crate provides the HTTP-side probe for a single target:
//! - TLS dial with verification disabled, reporting certificate issuer organizations
//! - Root page fetch and `<title>` extraction
//! - Favicon discovery (`<link rel="icon">`, falling back to `/favicon.ico`) and digest
//!
//! Every pass fails independently. A failure leaves that field empty.

pub mod client;
pub mod page;
pub mod prober;
pub mod tls;

pub use client::{ClientError, HttpClient, HttpResponse};
pub use page::{extract_favicon_href, extract_title, favicon_url};
pub use prober::{root_url, WebProber};
pub use tls::{issuer_orgs_from_der, TlsInspector};

use kvmscan_common::config::ScanConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP/TLS probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Whole-request timeout in seconds
    pub timeout_seconds: u64,
    /// TCP connect timeout in seconds, also used for TLS dials
    pub connect_timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Maximum redirects to follow
    pub max_redirects: u32,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 5,
            connect_timeout_seconds: 3,
            user_agent: format!("kvmscan/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 5,
        }
    }
}

impl WebConfig {
    pub fn with_timeout_seconds(mut self, timeout: u64) -> Self {
        self.timeout_seconds = timeout;
        self
    }

    pub fn with_connect_timeout_seconds(mut self, timeout: u64) -> Self {
        self.connect_timeout_seconds = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds.max(1))
    }
}

impl From<&ScanConfig> for WebConfig {
    fn from(scan: &ScanConfig) -> Self {
        Self {
            timeout_seconds: scan.http_timeout().as_secs(),
            connect_timeout_seconds: scan.connect_timeout().as_secs(),
            user_agent: scan.user_agent.clone(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scan_config() {
        let mut scan = ScanConfig::default();
        scan.http_timeout_seconds = 0;
        scan.connect_timeout_seconds = 7;
        scan.user_agent = String::from("scanner-agent/1");

        let config = WebConfig::from(&scan);
        assert_eq!(config.timeout_seconds, 1);
        assert_eq!(config.connect_timeout_seconds, 7);
        assert_eq!(config.user_agent, "scanner-agent/1");
        assert_eq!(config.max_redirects, WebConfig::default().max_redirects);
    }
}
