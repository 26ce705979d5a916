//! HTTP client for fingerprinting appliances
//!
//! Appliances ship self-signed certificates for whatever hostname they
//! were flashed with, so verification is off for both chain and hostname.

use crate::WebConfig;
use kvmscan_core::Error;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

/// HTTP client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Timeout after {0}s")]
    Timeout(u64),

    #[error("Unexpected status {status}")]
    Status { status: u16 },

    #[error("Failed to build client: {0}")]
    Build(String),
}

impl ClientError {
    /// Attach the URL this error came from
    pub fn into_error(self, url: &str) -> Error {
        Error::Http {
            url: url.to_string(),
            message: self.to_string(),
        }
    }
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Build(message) => Error::ProbeSetup {
                modality: String::from("http"),
                message,
            },
            other => Error::Http {
                url: String::new(),
                message: other.to_string(),
            },
        }
    }
}

/// HTTP response wrapper
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Final URL (after redirects)
    pub final_url: url::Url,
    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Verification-free HTTP client
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout_seconds: u64,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: &WebConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .redirect(reqwest::redirect::Policy::limited(
                config.max_redirects as usize,
            ))
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            client,
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Perform a GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse, ClientError> {
        let parsed = url::Url::parse(url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))?;
        self.get_url(parsed).await
    }

    /// Perform a GET request on a parsed URL
    pub async fn get_url(&self, url: url::Url) -> Result<HttpResponse, ClientError> {
        debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.timeout_seconds)
            } else if e.is_connect() {
                ClientError::ConnectionRefused
            } else {
                ClientError::Request(e)
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(self.timeout_seconds)
                } else {
                    ClientError::Request(e)
                }
            })?
            .to_vec();

        Ok(HttpResponse {
            status,
            final_url,
            body,
        })
    }

    /// GET that treats any non-2xx status as an error
    pub async fn get_success(&self, url: url::Url) -> Result<HttpResponse, ClientError> {
        let response = self.get_url(url).await?;
        if !response.is_success() {
            return Err(ClientError::Status {
                status: response.status,
            });
        }
        Ok(response)
    }
}
