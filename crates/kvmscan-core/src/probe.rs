//! Probe traits - the interface every evidence adapter implements
//!
//! Adapters never return an error for an expected negative outcome (no
//! devices, nothing resolved). `Err` is reserved for setup failures such as
//! a missing platform tool or an unbindable socket.

use crate::error::Result;
use crate::evidence::{ArpEvidence, HttpEvidence, ResolvedAddrs, UsbEvidence};
use crate::platform::Platform;
use serde::Serialize;

/// Result of a probe that may not run on every platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum ProbeOutcome<T> {
    /// The probe ran and produced evidence (possibly empty)
    Collected(T),
    /// The probe does not support this platform
    Unsupported { platform: Platform },
}

impl<T> ProbeOutcome<T> {
    pub fn collected(self) -> Option<T> {
        match self {
            ProbeOutcome::Collected(value) => Some(value),
            ProbeOutcome::Unsupported { .. } => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ProbeOutcome::Unsupported { .. })
    }
}

/// Address-resolution table probe
#[async_trait::async_trait]
pub trait ArpProbe: Send + Sync {
    async fn collect(&self) -> Result<ProbeOutcome<ArpEvidence>>;
}

/// Multicast-DNS name resolver
///
/// `Err` here is a per-domain negative result; the caller bounds each call
/// with its own timeout.
#[async_trait::async_trait]
pub trait MdnsResolver: Send + Sync {
    /// Short name for logs (e.g. "native", "subprocess")
    fn name(&self) -> &'static str;

    /// One-time setup check before any domain is resolved. An `Err` here
    /// means the modality contributes nothing this run.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    async fn resolve(&self, domain: &str) -> Result<ResolvedAddrs>;
}

/// USB enumeration probe
#[async_trait::async_trait]
pub trait UsbProbe: Send + Sync {
    async fn enumerate(&self) -> Result<ProbeOutcome<UsbEvidence>>;
}

/// HTTP/TLS/favicon probe for a single target
///
/// Each pass fails independently; a failed pass leaves its field empty.
#[async_trait::async_trait]
pub trait HttpProbe: Send + Sync {
    async fn probe(&self, target: &str) -> HttpEvidence;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let collected: ProbeOutcome<u8> = ProbeOutcome::Collected(3);
        assert_eq!(collected.clone().collected(), Some(3));
        assert!(!collected.is_unsupported());

        let unsupported: ProbeOutcome<u8> = ProbeOutcome::Unsupported {
            platform: Platform::Other,
        };
        assert!(unsupported.is_unsupported());
        assert_eq!(unsupported.collected(), None);
    }
}
