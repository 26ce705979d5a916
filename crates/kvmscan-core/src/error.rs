//! Error types for kvmscan

use thiserror::Error;

/// Result type alias using kvmscan Error
pub type Result<T> = std::result::Result<T, Error>;

/// kvmscan error types
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid indicator for {vendor}: {message}")]
    InvalidIndicator { vendor: String, message: String },

    #[error("Knowledgebase not found at: {path}")]
    KnowledgebaseNotFound { path: String },

    // === Probe Setup Errors ===
    #[error("Probe setup failed for {modality}: {message}")]
    ProbeSetup { modality: String, message: String },

    #[error("Command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    // === Per-target Errors ===
    #[error("Target unreachable: {target}")]
    TargetUnreachable { target: String },

    #[error("Connection timeout to {target}:{port}")]
    ConnectionTimeout { target: String, port: u16 },

    #[error("Name not resolved: {domain}")]
    NotResolved { domain: String },

    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    #[error("TLS error for {target}: {message}")]
    Tls { target: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Check if this error is fatal (should stop the run before matching)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::KnowledgebaseNotFound { .. } | Error::Yaml(_)
        )
    }

    /// Check if this error is scoped to a single target and safe to skip
    pub fn is_per_target(&self) -> bool {
        matches!(
            self,
            Error::TargetUnreachable { .. }
                | Error::ConnectionTimeout { .. }
                | Error::NotResolved { .. }
                | Error::Http { .. }
                | Error::Tls { .. }
                | Error::Parse(_)
        )
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::InvalidIndicator { .. } => "INVALID_INDICATOR",
            Error::KnowledgebaseNotFound { .. } => "KB_NOT_FOUND",
            Error::ProbeSetup { .. } => "PROBE_SETUP",
            Error::CommandFailed { .. } => "COMMAND_FAILED",
            Error::TargetUnreachable { .. } => "TARGET_UNREACHABLE",
            Error::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            Error::NotResolved { .. } => "NOT_RESOLVED",
            Error::Http { .. } => "HTTP_ERROR",
            Error::Tls { .. } => "TLS_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
        }
    }
}
