//! ARP table probe
//!
//! Runs `arp -a` and hands its output to a parse strategy chosen by
//! platform. Every strategy yields normalized `ArpEntry` values.

use kvmscan_common::command::run_command;
use kvmscan_core::{ArpEntry, ArpEvidence, ArpProbe, Platform, ProbeOutcome, Result};
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const BROADCAST_MAC: &str = "ff:ff:ff:ff:ff:ff";

/// Turns raw `arp -a` output into entries
pub trait ArpTableParser: Send + Sync {
    fn parse(&self, raw: &str) -> Vec<ArpEntry>;
}

/// BSD/macOS/Linux format: `? (192.168.68.56) at e6:c0:b:4b:d:26 on en0 ifscope [ethernet]`
pub struct UnixArpParser;

impl ArpTableParser for UnixArpParser {
    fn parse(&self, raw: &str) -> Vec<ArpEntry> {
        let mut entries = Vec::new();
        for line in raw.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 || parts[2] != "at" {
                continue;
            }

            let ip = parts[1].trim_matches(|c| c == '(' || c == ')');
            if ip.parse::<IpAddr>().is_err() {
                trace!(line, "Skipping ARP line without an IP");
                continue;
            }

            let mac = parts[3];
            if mac.contains("incomplete") {
                continue;
            }

            entries.push(ArpEntry::new(ip, mac));
        }
        entries
    }
}

/// Windows format:
///
/// ```text
/// Interface: 172.26.176.1 --- 0x48
///   Internet Address      Physical Address      Type
///   172.26.182.63         00-15-5d-e8-bf-8b     dynamic
/// ```
pub struct WindowsArpParser;

impl ArpTableParser for WindowsArpParser {
    fn parse(&self, raw: &str) -> Vec<ArpEntry> {
        let mut entries = Vec::new();
        for line in raw.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("Interface") || trimmed.starts_with("Internet") {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() < 2 {
                continue;
            }
            if fields[0].parse::<IpAddr>().is_err() {
                continue;
            }

            entries.push(ArpEntry::new(fields[0], fields[1]));
        }
        entries
    }
}

/// Select the parse strategy for a platform
pub fn parser_for(platform: Platform) -> Option<Box<dyn ArpTableParser>> {
    match platform {
        Platform::Linux | Platform::MacOs => Some(Box::new(UnixArpParser)),
        Platform::Windows => Some(Box::new(WindowsArpParser)),
        Platform::Other => None,
    }
}

/// `arp -a` backed probe
pub struct ArpTableProbe {
    platform: Platform,
    excluded_ips: HashSet<String>,
    command_timeout: Duration,
}

impl ArpTableProbe {
    pub fn new(platform: Platform, excluded_ips: &[String], command_timeout: Duration) -> Self {
        Self {
            platform,
            excluded_ips: excluded_ips.iter().cloned().collect(),
            command_timeout,
        }
    }

    /// Parse a captured table with this probe's strategy and exclusions
    pub fn evidence_from(&self, parser: &dyn ArpTableParser, raw: &str) -> ArpEvidence {
        parser
            .parse(raw)
            .into_iter()
            .filter(|entry| {
                if self.excluded_ips.contains(&entry.ip) {
                    trace!(ip = %entry.ip, "Excluded ARP entry");
                    return false;
                }
                entry.mac != BROADCAST_MAC
            })
            .inspect(|entry| debug!(ip = %entry.ip, mac = %entry.mac, "Discovered host via ARP"))
            .collect()
    }
}

#[async_trait::async_trait]
impl ArpProbe for ArpTableProbe {
    async fn collect(&self) -> Result<ProbeOutcome<ArpEvidence>> {
        let Some(parser) = parser_for(self.platform) else {
            warn!(os = %self.platform, "ARP discovery not supported on this OS");
            return Ok(ProbeOutcome::Unsupported {
                platform: self.platform,
            });
        };

        let raw = run_command("arp", &["-a"], self.command_timeout).await?;
        let evidence = self.evidence_from(parser.as_ref(), &raw);
        info!(hosts = evidence.len(), "ARP discovery complete");
        Ok(ProbeOutcome::Collected(evidence))
    }
}
