//! Per-OS USB enumeration collectors

use kvmscan_common::command::run_command;
use kvmscan_core::{Platform, ProbeOutcome, Result, UsbEvidence, UsbProbe};
use std::time::Duration;
use tracing::{info, warn};

/// One platform's enumeration tool
pub trait UsbCollector: Send + Sync {
    /// Program and arguments to run
    fn command(&self) -> (&'static str, &'static [&'static str]);

    /// Platform whose output format this collector produces
    fn platform(&self) -> Platform;
}

/// macOS I/O Registry dump. Reports `"idVendor" = <decimal>`.
pub struct IoregCollector;

impl UsbCollector for IoregCollector {
    fn command(&self) -> (&'static str, &'static [&'static str]) {
        ("ioreg", &["-p", "IOUSB", "-l", "-w", "0"])
    }

    fn platform(&self) -> Platform {
        Platform::MacOs
    }
}

/// Linux verbose `lsusb`. Reports `idVendor 0x1234` on its own line,
/// followed by `idProduct`.
pub struct LsusbCollector;

impl UsbCollector for LsusbCollector {
    fn command(&self) -> (&'static str, &'static [&'static str]) {
        ("lsusb", &["-v"])
    }

    fn platform(&self) -> Platform {
        Platform::Linux
    }
}

/// Select the collector for a platform
pub fn collector_for(platform: Platform) -> Option<Box<dyn UsbCollector>> {
    match platform {
        Platform::MacOs => Some(Box::new(IoregCollector)),
        Platform::Linux => Some(Box::new(LsusbCollector)),
        Platform::Windows | Platform::Other => None,
    }
}

/// USB probe backed by the platform enumeration tool
pub struct UsbEnumerator {
    platform: Platform,
    command_timeout: Duration,
}

impl UsbEnumerator {
    pub fn new(platform: Platform, command_timeout: Duration) -> Self {
        Self {
            platform,
            command_timeout,
        }
    }
}

#[async_trait::async_trait]
impl UsbProbe for UsbEnumerator {
    async fn enumerate(&self) -> Result<ProbeOutcome<UsbEvidence>> {
        let Some(collector) = collector_for(self.platform) else {
            warn!(os = %self.platform, "USB discovery not supported on this OS");
            return Ok(ProbeOutcome::Unsupported {
                platform: self.platform,
            });
        };

        let (program, args) = collector.command();
        let raw = run_command(program, args, self.command_timeout).await?;
        info!(bytes = raw.len(), tool = program, "USB enumeration captured");
        Ok(ProbeOutcome::Collected(UsbEvidence::new(
            collector.platform(),
            &raw,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_selection() {
        let mac = collector_for(Platform::MacOs).unwrap();
        assert_eq!(mac.command().0, "ioreg");
        assert_eq!(mac.platform(), Platform::MacOs);

        let linux = collector_for(Platform::Linux).unwrap();
        assert_eq!(linux.command(), ("lsusb", &["-v"][..]));

        assert!(collector_for(Platform::Windows).is_none());
        assert!(collector_for(Platform::Other).is_none());
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let probe = UsbEnumerator::new(Platform::Windows, Duration::from_secs(1));
        let outcome = probe.enumerate().await.unwrap();
        assert!(outcome.is_unsupported());
    }
}
