//! Correlation engine - runs the probes and matchers and assembles the report
//!
//! ARP, mDNS and USB run concurrently. The HTTP stage waits for ARP and mDNS
//! because its target list is the reconciliation of the two. A probe that
//! fails to set up, or is unsupported on this platform, empties its own
//! modality and nothing else.

use crate::http::match_http;
use crate::mac::match_macs;
use crate::reconcile::{reconcile_targets, resolve_and_reconcile};
use crate::report::{ArpSection, HttpSection, MdnsSection, Report, StageStatus, UsbSection};
use crate::usb::match_usb;
use kvmscan_common::config::ScanConfig;
use kvmscan_core::{
    ArpProbe, FindingSet, HttpProbe, MdnsResolver, Platform, ProbeOutcome, UsbProbe,
};
use kvmscan_indicators::Knowledgebase;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Engine tuning, taken from the run configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Bound on each mDNS domain query
    pub mdns_timeout: Duration,
    /// Maximum HTTP targets probed at once
    pub http_concurrency: usize,
    /// Platform recorded in the report
    pub platform: Platform,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default(), Platform::current())
    }
}

impl EngineSettings {
    pub fn from_config(config: &ScanConfig, platform: Platform) -> Self {
        Self {
            mdns_timeout: config.mdns_timeout(),
            http_concurrency: config.http_concurrency.max(1),
            platform,
        }
    }
}

/// The probe adapters the engine drives. A `None` modality is skipped.
#[derive(Clone, Default)]
pub struct Probes {
    pub arp: Option<Arc<dyn ArpProbe>>,
    pub mdns: Option<Arc<dyn MdnsResolver>>,
    pub usb: Option<Arc<dyn UsbProbe>>,
    pub http: Option<Arc<dyn HttpProbe>>,
}

impl Probes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arp(mut self, probe: Arc<dyn ArpProbe>) -> Self {
        self.arp = Some(probe);
        self
    }

    pub fn with_mdns(mut self, resolver: Arc<dyn MdnsResolver>) -> Self {
        self.mdns = Some(resolver);
        self
    }

    pub fn with_usb(mut self, probe: Arc<dyn UsbProbe>) -> Self {
        self.usb = Some(probe);
        self
    }

    pub fn with_http(mut self, probe: Arc<dyn HttpProbe>) -> Self {
        self.http = Some(probe);
        self
    }
}

/// Drives every probe and matcher against one shared knowledgebase
pub struct CorrelationEngine {
    kb: Arc<Knowledgebase>,
    settings: EngineSettings,
    probes: Probes,
}

impl CorrelationEngine {
    pub fn new(kb: Arc<Knowledgebase>, settings: EngineSettings, probes: Probes) -> Self {
        Self { kb, settings, probes }
    }

    /// Run one full scan. Never fails: every error is confined to the stage
    /// that raised it and recorded in that stage's status.
    pub async fn run(&self) -> Report {
        let start = Instant::now();
        info!(
            platform = %self.settings.platform,
            vendors = self.kb.len(),
            "Starting KVM fingerprint scan"
        );

        let (arp, (mdns, resolved_ipv4s), usb) =
            tokio::join!(self.arp_stage(), self.mdns_stage(), self.usb_stage());

        let http = self.http_stage(&arp, &mdns, &resolved_ipv4s).await;

        let report = Report::assemble(self.settings.platform, arp, mdns, usb, http);
        info!(
            findings = report.findings.len(),
            vendors = report.vendors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Scan complete"
        );
        report
    }

    async fn arp_stage(&self) -> ArpSection {
        let Some(probe) = &self.probes.arp else {
            return ArpSection::empty(StageStatus::Skipped);
        };

        match probe.collect().await {
            Ok(ProbeOutcome::Collected(entries)) => {
                info!(hosts = entries.len(), "ARP table collected");
                let findings = match_macs(&self.kb, &entries);
                ArpSection {
                    status: StageStatus::Completed,
                    entries,
                    findings,
                }
            }
            Ok(ProbeOutcome::Unsupported { platform }) => {
                warn!(os = %platform, "ARP collection not supported on this OS");
                ArpSection::empty(StageStatus::Unsupported { platform })
            }
            Err(e) => {
                error!(modality = "MAC", code = e.code(), "ARP probe failed: {}", e);
                ArpSection::empty(StageStatus::Failed {
                    error: e.to_string(),
                })
            }
        }
    }

    async fn mdns_stage(&self) -> (MdnsSection, BTreeSet<String>) {
        let Some(resolver) = &self.probes.mdns else {
            return (
                MdnsSection {
                    status: StageStatus::Skipped,
                    resolved: Vec::new(),
                },
                BTreeSet::new(),
            );
        };

        if let Err(e) = resolver.prepare().await {
            error!(
                resolver = resolver.name(),
                code = e.code(),
                "mDNS resolver unavailable: {}",
                e
            );
            return (
                MdnsSection {
                    status: StageStatus::Failed {
                        error: e.to_string(),
                    },
                    resolved: Vec::new(),
                },
                BTreeSet::new(),
            );
        }

        let (resolved, ipv4s) =
            resolve_and_reconcile(&self.kb, resolver.as_ref(), self.settings.mdns_timeout).await;
        info!(
            resolver = resolver.name(),
            resolved = resolved.len(),
            "mDNS resolution complete"
        );

        (
            MdnsSection {
                status: StageStatus::Completed,
                resolved,
            },
            ipv4s,
        )
    }

    async fn usb_stage(&self) -> UsbSection {
        let Some(probe) = &self.probes.usb else {
            return UsbSection::empty(StageStatus::Skipped);
        };

        match probe.enumerate().await {
            Ok(ProbeOutcome::Collected(evidence)) => {
                debug!(
                    os = %evidence.platform,
                    bytes = evidence.captured_bytes(),
                    "USB enumeration captured"
                );
                UsbSection {
                    status: StageStatus::Completed,
                    platform: Some(evidence.platform),
                    captured_bytes: evidence.captured_bytes(),
                    findings: match_usb(&self.kb, &evidence),
                }
            }
            Ok(ProbeOutcome::Unsupported { platform }) => {
                warn!(os = %platform, "USB enumeration not supported on this OS");
                UsbSection::empty(StageStatus::Unsupported { platform })
            }
            Err(e) => {
                error!(modality = "USB", code = e.code(), "USB probe failed: {}", e);
                UsbSection::empty(StageStatus::Failed {
                    error: e.to_string(),
                })
            }
        }
    }

    async fn http_stage(
        &self,
        arp: &ArpSection,
        mdns: &MdnsSection,
        resolved_ipv4s: &BTreeSet<String>,
    ) -> HttpSection {
        let reconciled = reconcile_targets(&arp.entries.ips(), resolved_ipv4s, &mdns.resolved);

        let Some(probe) = &self.probes.http else {
            return HttpSection {
                status: StageStatus::Skipped,
                reconciled,
                evidence: Vec::new(),
                findings: FindingSet::new(),
            };
        };

        info!(targets = reconciled.targets.len(), "Probing HTTP targets");
        let (evidence, findings) = match_http(
            &self.kb,
            probe.as_ref(),
            &reconciled.targets,
            self.settings.http_concurrency,
        )
        .await;

        HttpSection {
            status: StageStatus::Completed,
            reconciled,
            evidence,
            findings,
        }
    }
}
