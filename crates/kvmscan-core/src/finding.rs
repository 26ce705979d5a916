//! Finding definitions - vendor matches produced by the correlation engine

use crate::confidence::{Confidence, Modality};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One confirmed (vendor, modality, value, subject) match
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    /// Vendor name from the knowledgebase
    pub vendor: String,
    /// Evidence kind that produced the match
    pub modality: Modality,
    /// Confidence tier of the match
    pub confidence: Confidence,
    /// The matched value (prefix, certificate org, title, hash, USB descriptor)
    pub value: String,
    /// MAC, IP, or hostname the evidence pertains to
    pub subject: String,
}

impl Finding {
    pub fn new(
        vendor: impl Into<String>,
        modality: Modality,
        confidence: Confidence,
        value: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            modality,
            confidence,
            value: value.into(),
            subject: subject.into(),
        }
    }

    /// Identity used for suppression within a modality
    fn dedup_key(&self) -> (Modality, String, String, String) {
        (
            self.modality,
            self.vendor.clone(),
            self.value.clone(),
            self.subject.clone(),
        )
    }
}

/// Append-only finding list
///
/// Within one modality, a repeated (vendor, value, subject) triple is dropped.
/// The same vendor and subject may still appear under different modalities.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct FindingSet {
    findings: Vec<Finding>,
    #[serde(skip)]
    seen: HashSet<(Modality, String, String, String)>,
}

impl FindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finding. Returns false if it duplicated an existing one.
    pub fn push(&mut self, finding: Finding) -> bool {
        if self.seen.insert(finding.dedup_key()) {
            self.findings.push(finding);
            true
        } else {
            false
        }
    }

    /// Append every finding from another list, preserving order
    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter()
    }

    pub fn by_modality(&self, modality: Modality) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.modality == modality)
    }

    pub fn as_slice(&self) -> &[Finding] {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn into_vec(self) -> Vec<Finding> {
        self.findings
    }
}

impl FromIterator<Finding> for FindingSet {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        let mut set = FindingSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a FindingSet {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}
