//! Confidence tiers and evidence modalities

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Confidence tier attached to a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Weak signal, shared by many devices
    Low,
    /// Moderately identifying
    Medium,
    /// Strongly identifying
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl FromStr for Confidence {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(crate::Error::Parse(format!("unknown confidence: {}", other))),
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which kind of evidence produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Modality {
    #[serde(rename = "MAC")]
    Mac,
    #[serde(rename = "USB")]
    Usb,
    #[serde(rename = "SSL")]
    Ssl,
    Title,
    Favicon,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Mac => "MAC",
            Modality::Usb => "USB",
            Modality::Ssl => "SSL",
            Modality::Title => "Title",
            Modality::Favicon => "Favicon",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
