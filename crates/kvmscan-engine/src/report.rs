//! Report assembly: per-modality evidence and findings plus a ranked vendor
//! summary

use crate::reconcile::Reconciled;
use chrono::{DateTime, Utc};
use kvmscan_core::{
    ArpEvidence, Confidence, Error, FindingSet, HttpEvidence, MdnsEvidence, Modality, Platform,
    Result,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How a modality's stage ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StageStatus {
    /// Probe ran and its evidence was matched (possibly to nothing)
    Completed,
    /// Not run: disabled for this scan
    Skipped,
    /// Not run: the probe has no implementation for this platform
    Unsupported { platform: Platform },
    /// Probe setup failed; the modality contributes nothing
    Failed { error: String },
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Completed => write!(f, "completed"),
            StageStatus::Skipped => write!(f, "skipped"),
            StageStatus::Unsupported { platform } => write!(f, "unsupported on {}", platform),
            StageStatus::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArpSection {
    pub status: StageStatus,
    pub entries: ArpEvidence,
    pub findings: FindingSet,
}

impl ArpSection {
    pub fn empty(status: StageStatus) -> Self {
        Self {
            status,
            entries: ArpEvidence::new(),
            findings: FindingSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MdnsSection {
    pub status: StageStatus,
    pub resolved: Vec<MdnsEvidence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsbSection {
    pub status: StageStatus,
    /// Platform whose enumeration format was matched, when one ran
    pub platform: Option<Platform>,
    pub captured_bytes: usize,
    pub findings: FindingSet,
}

impl UsbSection {
    pub fn empty(status: StageStatus) -> Self {
        Self {
            status,
            platform: None,
            captured_bytes: 0,
            findings: FindingSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpSection {
    pub status: StageStatus,
    #[serde(flatten)]
    pub reconciled: Reconciled,
    pub evidence: Vec<HttpEvidence>,
    pub findings: FindingSet,
}

/// Per-vendor rollup of findings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorSummary {
    pub vendor: String,
    pub best_confidence: Confidence,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub modalities: BTreeSet<Modality>,
    pub total: usize,
}

impl VendorSummary {
    fn new(vendor: &str, confidence: Confidence) -> Self {
        Self {
            vendor: vendor.to_string(),
            best_confidence: confidence,
            high: 0,
            medium: 0,
            low: 0,
            modalities: BTreeSet::new(),
            total: 0,
        }
    }
}

/// Roll findings up per vendor and rank: best confidence, then number of
/// distinct modalities, then total findings, then vendor name.
pub fn rank_vendors(findings: &FindingSet) -> Vec<VendorSummary> {
    let mut by_vendor: BTreeMap<&str, VendorSummary> = BTreeMap::new();

    for finding in findings {
        let summary = by_vendor
            .entry(finding.vendor.as_str())
            .or_insert_with(|| VendorSummary::new(&finding.vendor, finding.confidence));

        summary.best_confidence = summary.best_confidence.max(finding.confidence);
        match finding.confidence {
            Confidence::High => summary.high += 1,
            Confidence::Medium => summary.medium += 1,
            Confidence::Low => summary.low += 1,
        }
        summary.modalities.insert(finding.modality);
        summary.total += 1;
    }

    let mut ranked: Vec<VendorSummary> = by_vendor.into_values().collect();
    ranked.sort_by(|a, b| {
        b.best_confidence
            .cmp(&a.best_confidence)
            .then_with(|| b.modalities.len().cmp(&a.modalities.len()))
            .then_with(|| b.total.cmp(&a.total))
            .then_with(|| a.vendor.cmp(&b.vendor))
    });
    ranked
}

/// Final output document
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub platform: Platform,
    pub arp: ArpSection,
    pub mdns: MdnsSection,
    pub usb: UsbSection,
    pub http: HttpSection,
    /// Every finding from every modality
    pub findings: FindingSet,
    pub vendors: Vec<VendorSummary>,
}

impl Report {
    pub fn assemble(
        platform: Platform,
        arp: ArpSection,
        mdns: MdnsSection,
        usb: UsbSection,
        http: HttpSection,
    ) -> Self {
        let mut findings = FindingSet::new();
        findings.extend(arp.findings.iter().cloned());
        findings.extend(usb.findings.iter().cloned());
        findings.extend(http.findings.iter().cloned());
        let vendors = rank_vendors(&findings);

        Self {
            generated_at: Utc::now(),
            platform,
            arp,
            mdns,
            usb,
            http,
            findings,
            vendors,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "kvmscan report ({}, {})",
            self.platform,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            f,
            "  ARP   {:<24} {} hosts, {} findings",
            self.arp.status.to_string(),
            self.arp.entries.len(),
            self.arp.findings.len()
        )?;
        writeln!(
            f,
            "  mDNS  {:<24} {} domains resolved",
            self.mdns.status.to_string(),
            self.mdns.resolved.len()
        )?;
        writeln!(
            f,
            "  USB   {:<24} {} bytes captured, {} findings",
            self.usb.status.to_string(),
            self.usb.captured_bytes,
            self.usb.findings.len()
        )?;
        writeln!(
            f,
            "  HTTP  {:<24} {} targets, {} findings",
            self.http.status.to_string(),
            self.http.reconciled.targets.len(),
            self.http.findings.len()
        )?;

        if self.vendors.is_empty() {
            return writeln!(f, "\nNo KVM vendors identified.");
        }

        writeln!(f, "\nVendors:")?;
        for summary in &self.vendors {
            let modalities: Vec<&str> = summary.modalities.iter().map(|m| m.as_str()).collect();
            writeln!(
                f,
                "  {:<16} {:<6} {} findings ({})",
                summary.vendor,
                summary.best_confidence.as_str(),
                summary.total,
                modalities.join(", ")
            )?;
        }

        writeln!(f, "\nFindings:")?;
        for finding in &self.findings {
            writeln!(
                f,
                "  [{:<6}] {:<16} {:<8} {} ({})",
                finding.confidence.as_str(),
                finding.vendor,
                finding.modality.as_str(),
                finding.value,
                finding.subject
            )?;
        }
        Ok(())
    }
}
