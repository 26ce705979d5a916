//! YAML indicator document, in the shape vendors author it

use kvmscan_core::Confidence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level indicator document. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorDocument {
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub http: HttpSection,
    /// vendor -> USB device descriptors
    #[serde(default)]
    pub usb: BTreeMap<String, Vec<UsbDeviceDef>>,
}

impl IndicatorDocument {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserializes as unit; treat it as an empty document
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSection {
    /// vendor -> domain names to resolve
    #[serde(default)]
    pub mdns: BTreeMap<String, Vec<String>>,
    /// vendor -> MAC prefix rules
    #[serde(default)]
    pub mac_addresses: BTreeMap<String, MacPrefixGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacPrefixGroup {
    #[serde(default)]
    pub prefixes: Vec<MacPrefixDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacPrefixDef {
    pub prefix: String,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpSection {
    /// vendor -> certificate issuer organization substring(s)
    #[serde(default)]
    pub ssl: BTreeMap<String, OneOrMany>,
    /// vendor -> favicon MD5 hex digests
    #[serde(default)]
    pub favicon: BTreeMap<String, Vec<String>>,
    /// vendor -> page title substrings
    #[serde(default)]
    pub title: BTreeMap<String, Vec<String>>,
}

/// A single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbDeviceDef {
    pub vid: HexField,
    pub pid: HexField,
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default, alias = "windows_search_sring")]
    pub windows_search_string: String,
}

/// VID/PID as written in YAML. Only quoted text is usable: an unquoted
/// `0x1234` or `1234` has already been read as an integer by the YAML
/// parser, and its original hex spelling is lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HexField {
    Text(String),
    Number(u64),
}

impl HexField {
    /// The hex text, or `None` when the value was an unquoted integer
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HexField::Text(s) => Some(s),
            HexField::Number(_) => None,
        }
    }
}
