//! Knowledgebase - vendor-keyed indicator sets
//!
//! The indicator document groups rules by modality; matchers want them by
//! vendor. `Knowledgebase::from_document` pivots once at load and normalizes
//! values. Nothing mutates it afterwards.

use crate::document::IndicatorDocument;
use kvmscan_core::{normalize_mac, Confidence, Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// One MAC prefix rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacPrefix {
    /// Lowercase, colon-separated
    pub prefix: String,
    pub confidence: Confidence,
    pub reference: Option<String>,
}

/// One USB device descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsbDevice {
    /// Hex text, lowercase, without `0x`
    pub vid: String,
    /// Hex text, lowercase, without `0x`
    pub pid: String,
    pub serial: String,
    pub manufacturer: String,
    pub search_hint: String,
}

/// All indicators declared for one vendor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndicatorSet {
    pub mac_prefixes: Vec<MacPrefix>,
    pub mdns_names: BTreeSet<String>,
    pub usb_devices: Vec<UsbDevice>,
    pub ssl_issuer_substrings: BTreeSet<String>,
    pub title_substrings: BTreeSet<String>,
    /// Lowercase MD5 hex digests
    pub favicon_hashes: BTreeSet<String>,
}

impl IndicatorSet {
    pub fn is_empty(&self) -> bool {
        self.mac_prefixes.is_empty()
            && self.mdns_names.is_empty()
            && self.usb_devices.is_empty()
            && self.ssl_issuer_substrings.is_empty()
            && self.title_substrings.is_empty()
            && self.favicon_hashes.is_empty()
    }
}

/// Indicator counts, for startup logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgebaseStats {
    pub vendors: usize,
    pub mac_prefixes: usize,
    pub mdns_names: usize,
    pub usb_devices: usize,
    pub ssl_issuers: usize,
    pub titles: usize,
    pub favicons: usize,
}

/// Immutable vendor -> indicator mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Knowledgebase {
    vendors: BTreeMap<String, IndicatorSet>,
}

impl Knowledgebase {
    /// Parse a YAML document and pivot it. Malformed YAML is fatal.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document = IndicatorDocument::from_yaml(yaml)
            .map_err(|e| Error::Configuration(format!("Failed to parse indicators: {}", e)))?;
        Ok(Self::from_document(document))
    }

    /// Pivot a parsed document. Individual malformed entries are logged and
    /// skipped; the rest of the document still loads.
    pub fn from_document(document: IndicatorDocument) -> Self {
        let mut vendors: BTreeMap<String, IndicatorSet> = BTreeMap::new();

        for (vendor, group) in document.network.mac_addresses {
            for def in group.prefixes {
                match normalize_prefix(&def.prefix) {
                    Ok(prefix) => vendors.entry(vendor.clone()).or_default().mac_prefixes.push(
                        MacPrefix {
                            prefix,
                            confidence: def.confidence,
                            reference: def.reference,
                        },
                    ),
                    Err(message) => skip(&vendor, "mac_addresses", &message),
                }
            }
        }

        for (vendor, domains) in document.network.mdns {
            for domain in domains {
                let domain = domain.trim().trim_end_matches('.').to_lowercase();
                if domain.is_empty() {
                    skip(&vendor, "mdns", "empty domain");
                    continue;
                }
                vendors.entry(vendor.clone()).or_default().mdns_names.insert(domain);
            }
        }

        for (vendor, devices) in document.usb {
            for def in devices {
                let (Some(vid), Some(pid)) = (def.vid.as_text(), def.pid.as_text()) else {
                    skip(&vendor, "usb", "VID/PID must be a quoted hex string");
                    continue;
                };
                let vid = normalize_hex_text(vid);
                let pid = normalize_hex_text(pid);
                if vid.is_empty() || pid.is_empty() {
                    skip(&vendor, "usb", "missing vid or pid");
                    continue;
                }
                vendors.entry(vendor.clone()).or_default().usb_devices.push(UsbDevice {
                    vid,
                    pid,
                    serial: def.serial.trim().to_string(),
                    manufacturer: def.manufacturer.trim().to_string(),
                    search_hint: def.windows_search_string,
                });
            }
        }

        for (vendor, issuers) in document.http.ssl {
            for issuer in issuers.into_vec() {
                if issuer.is_empty() {
                    skip(&vendor, "ssl", "empty issuer substring");
                    continue;
                }
                vendors
                    .entry(vendor.clone())
                    .or_default()
                    .ssl_issuer_substrings
                    .insert(issuer);
            }
        }

        for (vendor, titles) in document.http.title {
            for title in titles {
                if title.is_empty() {
                    skip(&vendor, "title", "empty title substring");
                    continue;
                }
                vendors.entry(vendor.clone()).or_default().title_substrings.insert(title);
            }
        }

        for (vendor, hashes) in document.http.favicon {
            for hash in hashes {
                let hash = hash.trim().to_lowercase();
                if hash.len() != 32 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                    skip(&vendor, "favicon", &format!("not an MD5 hex digest: {:?}", hash));
                    continue;
                }
                vendors.entry(vendor.clone()).or_default().favicon_hashes.insert(hash);
            }
        }

        let kb = Self { vendors };
        debug!(stats = ?kb.stats(), "Knowledgebase built");
        kb
    }

    /// Get a vendor's indicator set
    pub fn get(&self, vendor: &str) -> Option<&IndicatorSet> {
        self.vendors.get(vendor)
    }

    /// Iterate vendors in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndicatorSet)> {
        self.vendors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn vendors(&self) -> impl Iterator<Item = &str> {
        self.vendors.keys().map(|s| s.as_str())
    }

    /// Every (vendor, domain) pair to resolve
    pub fn mdns_queries(&self) -> Vec<(String, String)> {
        self.iter()
            .flat_map(|(vendor, set)| {
                set.mdns_names
                    .iter()
                    .map(move |domain| (vendor.to_string(), domain.clone()))
            })
            .collect()
    }

    pub fn stats(&self) -> KnowledgebaseStats {
        self.vendors.values().fold(
            KnowledgebaseStats {
                vendors: self.vendors.len(),
                ..Default::default()
            },
            |mut acc, set| {
                acc.mac_prefixes += set.mac_prefixes.len();
                acc.mdns_names += set.mdns_names.len();
                acc.usb_devices += set.usb_devices.len();
                acc.ssl_issuers += set.ssl_issuer_substrings.len();
                acc.titles += set.title_substrings.len();
                acc.favicons += set.favicon_hashes.len();
                acc
            },
        )
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

impl FromIterator<(String, IndicatorSet)> for Knowledgebase {
    fn from_iter<I: IntoIterator<Item = (String, IndicatorSet)>>(iter: I) -> Self {
        Self {
            vendors: iter.into_iter().collect(),
        }
    }
}

fn skip(vendor: &str, section: &str, message: &str) {
    let err = Error::InvalidIndicator {
        vendor: vendor.to_string(),
        message: format!("{}: {}", section, message),
    };
    warn!(code = err.code(), "Skipping indicator: {}", err);
}

/// Lowercase and colon-separate a prefix, zero-padding every octet that is
/// followed by a separator (`0:15:5d` is `00:15:5d`). The last group is kept
/// as written unless the prefix is a whole address, so a trailing single
/// digit still matches on one nibble.
fn normalize_prefix(raw: &str) -> std::result::Result<String, String> {
    let prefix = raw.trim().to_lowercase().replace('-', ":");
    if prefix.is_empty() {
        return Err(String::from("empty prefix"));
    }
    if !prefix.chars().all(|c| c == ':' || c.is_ascii_hexdigit()) {
        return Err(format!("not a MAC prefix: {:?}", raw));
    }

    let groups: Vec<&str> = prefix.split(':').collect();
    if groups.len() > 6 || groups.iter().any(|g| g.len() > 2) {
        return Err(format!("not a MAC prefix: {:?}", raw));
    }
    let last = groups.len() - 1;
    let mut octets = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        if i < last || groups.len() == 6 {
            if group.is_empty() {
                return Err(format!("empty octet in MAC prefix: {:?}", raw));
            }
            octets.push(format!("{:0>2}", group));
        } else {
            octets.push(group.to_string());
        }
    }
    Ok(octets.join(":"))
}

/// Lowercase hex text without a `0x` prefix. Validity is checked by the
/// matcher, which skips the device if it does not parse.
fn normalize_hex_text(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    lowered
        .strip_prefix("0x")
        .map(str::to_string)
        .unwrap_or(lowered)
}
