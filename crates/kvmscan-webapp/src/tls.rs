//! TLS certificate issuer inspection

use kvmscan_core::{Error, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, trace};
use x509_parser::prelude::*;

/// Dials TLS targets and reports the peer certificate's issuer organizations
#[derive(Debug, Clone)]
pub struct TlsInspector {
    port: u16,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl TlsInspector {
    pub fn new(connect_timeout: Duration, handshake_timeout: Duration) -> Self {
        Self {
            port: 443,
            connect_timeout,
            handshake_timeout,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Issuer organization values of the certificate `target` presents.
    ///
    /// native-tls exposes only the leaf certificate, so intermediates are
    /// not inspected.
    pub async fn issuer_orgs(&self, target: &str) -> Result<Vec<String>> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| Error::ProbeSetup {
                modality: String::from("ssl"),
                message: e.to_string(),
            })?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        trace!("Dialing TLS {}:{}", target, self.port);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((target, self.port)))
            .await
            .map_err(|_| Error::ConnectionTimeout {
                target: target.to_string(),
                port: self.port,
            })?
            .map_err(|_| Error::TargetUnreachable {
                target: target.to_string(),
            })?;

        let tls_stream = tokio::time::timeout(self.handshake_timeout, connector.connect(target, stream))
            .await
            .map_err(|_| Error::ConnectionTimeout {
                target: target.to_string(),
                port: self.port,
            })?
            .map_err(|e| Error::Tls {
                target: target.to_string(),
                message: e.to_string(),
            })?;

        let cert = tls_stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| Error::Tls {
                target: target.to_string(),
                message: e.to_string(),
            })?;
        let Some(cert) = cert else {
            debug!(host = target, "Peer presented no certificate");
            return Ok(Vec::new());
        };

        let der = cert.to_der().map_err(|e| Error::Tls {
            target: target.to_string(),
            message: e.to_string(),
        })?;
        issuer_orgs_from_der(&der)
    }
}

/// Issuer `O=` values of a DER certificate, in DN order
pub fn issuer_orgs_from_der(der: &[u8]) -> Result<Vec<String>> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| Error::Parse(format!("invalid certificate: {}", e)))?;

    Ok(cert
        .issuer()
        .iter_organization()
        .filter_map(|attr| attr.as_str().ok())
        .map(str::to_string)
        .collect())
}
