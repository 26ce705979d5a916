//! USB descriptor matcher
//!
//! Each (vendor, device) rule runs three independent tests against the
//! lowercased enumeration dump: manufacturer string, VID/PID pair and serial
//! number. The VID/PID test depends on how the platform's tool prints IDs.

use kvmscan_core::{Confidence, Finding, FindingSet, Modality, Platform, UsbEvidence};
use kvmscan_indicators::{Knowledgebase, UsbDevice};
use regex::Regex;
use tracing::{info, warn};

/// Subject recorded on USB findings; the evidence is the local host's bus
pub const USB_SUBJECT: &str = "usb";

/// How a platform's enumeration tool prints vendor and product IDs
pub trait IdEncoding: Send + Sync {
    /// `vid`/`pid` are already validated hex
    fn matches(&self, blob: &str, vid: u32, pid: u32) -> bool;
}

/// `"idVendor" = 4660` style (macOS I/O Registry)
pub struct DecimalIds;

impl IdEncoding for DecimalIds {
    fn matches(&self, blob: &str, vid: u32, pid: u32) -> bool {
        // The blob is lowercased
        blob.contains(&format!("\"idvendor\" = {}", vid))
            && blob.contains(&format!("\"idproduct\" = {}", pid))
    }
}

/// `idVendor 0x1234` line directly followed by an `idProduct 0x5678` line
/// (Linux `lsusb -v`)
pub struct HexIds;

impl IdEncoding for HexIds {
    fn matches(&self, blob: &str, vid: u32, pid: u32) -> bool {
        let pattern = format!(".*{:04x}.*\n.*{:04x}.*\n", vid, pid);
        match Regex::new(&pattern) {
            Ok(re) => re.is_match(blob),
            Err(e) => {
                warn!(pattern = %pattern, "Invalid VID/PID pattern: {}", e);
                false
            }
        }
    }
}

/// Select the ID encoding for the platform that produced the dump
pub fn encoding_for(platform: Platform) -> Option<Box<dyn IdEncoding>> {
    match platform {
        Platform::MacOs => Some(Box::new(DecimalIds)),
        Platform::Linux => Some(Box::new(HexIds)),
        Platform::Windows | Platform::Other => None,
    }
}

fn parse_hex_id(text: &str) -> Option<u32> {
    u32::from_str_radix(text, 16).ok()
}

/// Match every vendor's USB descriptors against an enumeration dump.
///
/// A platform without a known ID encoding yields no findings. A device whose
/// VID or PID is not hex is logged and skipped; other devices still match.
pub fn match_usb(kb: &Knowledgebase, evidence: &UsbEvidence) -> FindingSet {
    let mut findings = FindingSet::new();
    let Some(encoding) = encoding_for(evidence.platform) else {
        warn!(os = %evidence.platform, "USB matching not supported on this OS");
        return findings;
    };
    let blob = evidence.blob();

    for (vendor, set) in kb.iter() {
        for device in &set.usb_devices {
            let (Some(vid), Some(pid)) = (parse_hex_id(&device.vid), parse_hex_id(&device.pid)) else {
                warn!(
                    vendor,
                    vid = %device.vid,
                    pid = %device.pid,
                    code = "INVALID_INDICATOR",
                    "Skipping USB device with non-hex VID/PID"
                );
                continue;
            };

            match_device(vendor, device, vid, pid, blob, encoding.as_ref(), &mut findings);
        }
    }

    findings
}

fn match_device(
    vendor: &str,
    device: &UsbDevice,
    vid: u32,
    pid: u32,
    blob: &str,
    encoding: &dyn IdEncoding,
    findings: &mut FindingSet,
) {
    let manufacturer = device.manufacturer.to_lowercase();
    if !manufacturer.is_empty() && blob.contains(&manufacturer) {
        record(
            findings,
            vendor,
            Confidence::High,
            format!("manufacturer:{}", device.manufacturer),
        );
    }

    if encoding.matches(blob, vid, pid) {
        record(
            findings,
            vendor,
            Confidence::Low,
            format!("vid/pid:{}:{}", device.vid, device.pid),
        );
    }

    let serial = device.serial.to_lowercase();
    if !serial.is_empty() && blob.contains(&serial) {
        record(
            findings,
            vendor,
            Confidence::Medium,
            format!("serial:{}", device.serial),
        );
    }
}

fn record(findings: &mut FindingSet, vendor: &str, confidence: Confidence, value: String) {
    let finding = Finding::new(vendor, Modality::Usb, confidence, value, USB_SUBJECT);
    if findings.push(finding.clone()) {
        info!(
            vendor,
            confidence = %confidence,
            value = %finding.value,
            "USB device match found"
        );
    }
}
