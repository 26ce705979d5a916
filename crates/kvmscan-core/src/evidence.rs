//! Normalized evidence records handed from probe adapters to the engine

use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Normalize a MAC address to lowercase, colon-separated form.
///
/// Dashes become colons. When the input has six octets, each octet is
/// zero-padded to two digits (`e6:c0:b:4b:d:26` -> `e6:c0:0b:4b:0d:26`).
pub fn normalize_mac(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace('-', ":");
    let octets: Vec<&str> = lowered.split(':').collect();

    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| !o.is_empty() && o.len() <= 2 && o.chars().all(|c| c.is_ascii_hexdigit()));

    if well_formed {
        octets
            .iter()
            .map(|o| format!("{:0>2}", o))
            .collect::<Vec<_>>()
            .join(":")
    } else {
        lowered
    }
}

/// One IP/MAC binding from the address-resolution table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArpEntry {
    pub ip: String,
    /// Always normalized (see [`normalize_mac`])
    pub mac: String,
}

impl ArpEntry {
    pub fn new(ip: impl Into<String>, mac: &str) -> Self {
        Self {
            ip: ip.into(),
            mac: normalize_mac(mac),
        }
    }
}

/// Address-resolution evidence: a set of IP/MAC bindings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArpEvidence {
    entries: Vec<ArpEntry>,
}

impl ArpEvidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, ignoring exact duplicates
    pub fn insert(&mut self, entry: ArpEntry) {
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// Distinct IPs in discovery order
    pub fn ips(&self) -> Vec<String> {
        let mut ips: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !ips.contains(&entry.ip) {
                ips.push(entry.ip.clone());
            }
        }
        ips
    }

    /// Distinct MACs in discovery order
    pub fn macs(&self) -> Vec<String> {
        let mut macs: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !macs.contains(&entry.mac) {
                macs.push(entry.mac.clone());
            }
        }
        macs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<ArpEntry> for ArpEvidence {
    fn from_iter<I: IntoIterator<Item = ArpEntry>>(iter: I) -> Self {
        let mut evidence = ArpEvidence::new();
        for entry in iter {
            evidence.insert(entry);
        }
        evidence
    }
}

/// Addresses returned by a successful name resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAddrs {
    pub ipv4s: Vec<Ipv4Addr>,
    pub ipv6s: Vec<Ipv6Addr>,
}

impl ResolvedAddrs {
    pub fn is_empty(&self) -> bool {
        self.ipv4s.is_empty() && self.ipv6s.is_empty()
    }
}

/// A configured domain that resolved during this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdnsEvidence {
    /// Vendor the domain was configured under (a query label, not a match)
    pub vendor_hint: String,
    pub domain: String,
    pub ipv4s: Vec<Ipv4Addr>,
    pub ipv6s: Vec<Ipv6Addr>,
}

impl MdnsEvidence {
    pub fn new(vendor_hint: impl Into<String>, domain: impl Into<String>, addrs: ResolvedAddrs) -> Self {
        Self {
            vendor_hint: vendor_hint.into(),
            domain: domain.into(),
            ipv4s: addrs.ipv4s,
            ipv6s: addrs.ipv6s,
        }
    }
}

/// Raw USB enumeration dump, lowercased, plus the platform that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbEvidence {
    pub platform: Platform,
    #[serde(skip_serializing)]
    blob: String,
}

impl UsbEvidence {
    pub fn new(platform: Platform, raw: &str) -> Self {
        Self {
            platform,
            blob: raw.to_lowercase(),
        }
    }

    pub fn blob(&self) -> &str {
        &self.blob
    }

    /// Size of the captured enumeration text
    pub fn captured_bytes(&self) -> usize {
        self.blob.len()
    }
}

/// What the HTTP/TLS probe observed for one target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpEvidence {
    /// IP or hostname
    pub target: String,
    /// Issuer organization fields of every peer certificate
    #[serde(default)]
    pub ssl_issuer_orgs: Vec<String>,
    pub page_title: Option<String>,
    /// MD5 hex digest of the favicon bytes
    pub favicon_hash: Option<String>,
}

impl HttpEvidence {
    pub fn empty(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }
}
