//! kvmscan USB - USB device enumeration
//!
//! Captures the host's USB enumeration dump with the platform tool and
//! hands it to the engine as lowercased text. Matching happens in the engine.

pub mod collectors;

pub use collectors::{collector_for, IoregCollector, LsusbCollector, UsbCollector, UsbEnumerator};
