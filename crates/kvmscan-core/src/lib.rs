//! kvmscan Core - Foundation types, traits, and error handling
//!
//! This crate provides the core abstractions shared by every kvmscan crate:
//! - `Finding`: one vendor match produced by the correlation engine
//! - Evidence records (`ArpEvidence`, `MdnsEvidence`, `UsbEvidence`, `HttpEvidence`)
//!   handed from probe adapters to the engine
//! - Probe traits (`ArpProbe`, `MdnsResolver`, `UsbProbe`, `HttpProbe`)
//! - `Confidence`, `Modality`, `Platform`: core enums

pub mod confidence;
pub mod error;
pub mod evidence;
pub mod finding;
pub mod platform;
pub mod probe;

// Re-export commonly used types at crate root
pub use confidence::{Confidence, Modality};
pub use error::{Error, Result};
pub use evidence::{
    normalize_mac, ArpEntry, ArpEvidence, HttpEvidence, MdnsEvidence, ResolvedAddrs, UsbEvidence,
};
pub use finding::{Finding, FindingSet};
pub use platform::Platform;
pub use probe::{ArpProbe, HttpProbe, MdnsResolver, ProbeOutcome, UsbProbe};
