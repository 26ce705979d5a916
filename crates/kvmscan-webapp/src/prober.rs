//! Per-target HTTP/TLS probe
//!
//! One target gets three passes: TLS issuer, root page title and favicon
//! digest. The root page is fetched once and serves both the title and the
//! favicon lookup.

use crate::client::{ClientError, HttpClient};
use crate::page::{extract_favicon_href, extract_title, favicon_url};
use crate::tls::TlsInspector;
use crate::WebConfig;
use kvmscan_common::digest::md5_hex;
use kvmscan_core::{HttpEvidence, HttpProbe};
use std::net::Ipv6Addr;
use tracing::debug;
use url::Url;

/// Port every pass dials unless overridden
pub const HTTPS_PORT: u16 = 443;

/// `HttpProbe` backed by a real HTTP client and TLS dialer
pub struct WebProber {
    client: HttpClient,
    tls: TlsInspector,
    port: u16,
}

impl WebProber {
    pub fn new(config: &WebConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: HttpClient::new(config)?,
            tls: TlsInspector::new(config.connect_timeout(), config.timeout()),
            port: HTTPS_PORT,
        })
    }

    /// Dial `port` instead of 443 for both the TLS and the HTTP passes
    pub fn with_port(mut self, port: u16) -> Self {
        self.tls = self.tls.with_port(port);
        self.port = port;
        self
    }

    async fn tls_pass(&self, target: &str, evidence: &mut HttpEvidence) {
        match self.tls.issuer_orgs(target).await {
            Ok(orgs) => {
                debug!(host = target, issuers = ?orgs, "TLS issuer collected");
                evidence.ssl_issuer_orgs = orgs;
            }
            Err(e) => debug!(host = target, code = e.code(), "TLS pass failed: {}", e),
        }
    }

    /// Title pass. Returns the page URL and declared icon for the favicon pass.
    async fn page_pass(&self, root: Url, evidence: &mut HttpEvidence) -> (Url, Option<String>) {
        match self.client.get_success(root.clone()).await {
            Ok(response) => {
                let html = response.text();
                evidence.page_title = extract_title(&html);
                if evidence.page_title.is_none() {
                    debug!(url = %root, "Page has no title");
                }
                (response.final_url, extract_favicon_href(&html))
            }
            Err(e) => {
                debug!(url = %root, "Page fetch failed: {}", e);
                (root, None)
            }
        }
    }

    async fn favicon_pass(&self, page: &Url, href: Option<&str>, evidence: &mut HttpEvidence) {
        let url = match favicon_url(page, href) {
            Ok(url) => url,
            Err(e) => {
                debug!(url = %page, href = ?href, "Unresolvable favicon location: {}", e);
                return;
            }
        };

        match self.client.get_success(url.clone()).await {
            Ok(response) if response.body.is_empty() => {
                debug!(url = %url, "Empty favicon body");
            }
            Ok(response) => {
                let digest = md5_hex(&response.body);
                debug!(url = %url, digest = %digest, "Favicon hashed");
                evidence.favicon_hash = Some(digest);
            }
            Err(e) => debug!(url = %url, "Favicon fetch failed: {}", e),
        }
    }
}

/// `https://<target>[:port]/`, bracketing IPv6 literals
pub fn root_url(target: &str, port: u16) -> Result<Url, url::ParseError> {
    let host = if target.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]", target)
    } else {
        target.to_string()
    };
    if port == HTTPS_PORT {
        Url::parse(&format!("https://{}/", host))
    } else {
        Url::parse(&format!("https://{}:{}/", host, port))
    }
}

#[async_trait::async_trait]
impl HttpProbe for WebProber {
    async fn probe(&self, target: &str) -> HttpEvidence {
        let mut evidence = HttpEvidence::empty(target);

        self.tls_pass(target, &mut evidence).await;

        let root = match root_url(target, self.port) {
            Ok(url) => url,
            Err(e) => {
                debug!(host = target, "Not a usable HTTP host: {}", e);
                return evidence;
            }
        };
        let (page, href) = self.page_pass(root, &mut evidence).await;
        self.favicon_pass(&page, href.as_deref(), &mut evidence).await;

        evidence
    }
}
