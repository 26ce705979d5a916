//! kvmscan Indicators - Vendor indicator document, loader, and knowledgebase
//!
//! This crate provides:
//! - The YAML indicator document model (grouped by modality, as authored)
//! - `Knowledgebase`: the document pivoted to vendor -> `IndicatorSet`,
//!   immutable after load and shared by reference across matchers
//! - A loader that treats a missing or malformed document as fatal

pub mod document;
pub mod knowledgebase;
pub mod loader;

pub use document::IndicatorDocument;
pub use knowledgebase::{IndicatorSet, Knowledgebase, MacPrefix, UsbDevice};
pub use loader::load_knowledgebase;
