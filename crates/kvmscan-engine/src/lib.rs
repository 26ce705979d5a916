//! kvmscan Engine - Evidence correlation and indicator matching
//!
//! This crate turns probe evidence into vendor findings:
//! - MAC prefix matching against the ARP table
//! - USB descriptor matching against the enumeration dump, per-OS ID encoding
//! - Certificate issuer, page title and favicon matching per HTTP target
//! - mDNS resolution and reconciliation of the HTTP target list
//! - Orchestration of all probes and report assembly

pub mod engine;
pub mod http;
pub mod mac;
pub mod reconcile;
pub mod report;
pub mod usb;

pub use engine::{CorrelationEngine, EngineSettings, Probes};
pub use http::{match_http, match_http_evidence};
pub use mac::match_macs;
pub use reconcile::{reconcile_targets, resolve_and_reconcile, Reconciled};
pub use report::{Report, StageStatus, VendorSummary};
pub use usb::{encoding_for, match_usb, DecimalIds, HexIds, IdEncoding};
