//! kvmscan Common - Shared utilities: run configuration, logging, digests
//!
//! This crate provides common functionality used across all kvmscan crates.

pub mod command;
pub mod config;
pub mod digest;
pub mod logging;

pub use config::{Config, MdnsMode};
pub use logging::{init_logging_with_config, LogConfig, LogFormat};
