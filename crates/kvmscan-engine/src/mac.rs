//! MAC prefix matcher

use kvmscan_core::{normalize_mac, ArpEvidence, Finding, FindingSet, Modality};
use kvmscan_indicators::Knowledgebase;
use tracing::info;

/// Match every discovered MAC against every vendor's prefixes.
///
/// All matches are kept: one MAC may hit several vendors, or several
/// prefixes of one vendor. Only identical (vendor, prefix, MAC) triples
/// collapse. Confidence comes from the prefix rule.
pub fn match_macs(kb: &Knowledgebase, arp: &ArpEvidence) -> FindingSet {
    let mut findings = FindingSet::new();
    let macs: Vec<String> = arp.macs().iter().map(|m| normalize_mac(m)).collect();

    for (vendor, set) in kb.iter() {
        for rule in &set.mac_prefixes {
            for mac in macs.iter().filter(|mac| mac.starts_with(&rule.prefix)) {
                let finding = Finding::new(vendor, Modality::Mac, rule.confidence, &rule.prefix, mac);
                if findings.push(finding) {
                    info!(
                        vendor,
                        confidence = %rule.confidence,
                        value = %rule.prefix,
                        subject = %mac,
                        "MAC address match found"
                    );
                }
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvmscan_core::{ArpEntry, Confidence};

    fn kb() -> Knowledgebase {
        Knowledgebase::from_yaml(
            r#"
network:
  mac_addresses:
    glinet:
      prefixes:
        - prefix: "94:83:c4"
          confidence: high
        - prefix: "94:83"
          confidence: low
    acme:
      prefixes:
        - prefix: "AA-BB-CC"
          confidence: medium
"#,
        )
        .unwrap()
    }

    fn arp(entries: &[(&str, &str)]) -> ArpEvidence {
        entries.iter().map(|(ip, mac)| ArpEntry::new(*ip, mac)).collect()
    }

    #[test]
    fn test_prefix_match_is_case_and_separator_insensitive() {
        let findings = match_macs(&kb(), &arp(&[("10.0.0.5", "AA:BB:CC:11:22:33")]));
        assert_eq!(findings.len(), 1);

        let finding = &findings.as_slice()[0];
        assert_eq!(finding.vendor, "acme");
        assert_eq!(finding.modality, Modality::Mac);
        assert_eq!(finding.confidence, Confidence::Medium);
        assert_eq!(finding.value, "aa:bb:cc");
        assert_eq!(finding.subject, "aa:bb:cc:11:22:33");
    }

    #[test]
    fn test_two_prefixes_of_one_vendor_yield_two_findings() {
        let findings = match_macs(&kb(), &arp(&[("10.0.0.7", "94-83-C4-01-02-03")]));
        let values: Vec<_> = findings.iter().map(|f| (f.value.as_str(), f.confidence)).collect();
        assert_eq!(
            values,
            vec![("94:83:c4", Confidence::High), ("94:83", Confidence::Low)]
        );
    }

    #[test]
    fn test_repeated_mac_is_deduplicated() {
        // Same MAC seen on two IPs, and the matcher run twice over the result
        let evidence = arp(&[("10.0.0.7", "94:83:c4:01:02:03"), ("10.0.0.8", "94:83:C4:01:02:03")]);
        let mut findings = match_macs(&kb(), &evidence);
        assert_eq!(findings.len(), 2);

        findings.extend(match_macs(&kb(), &evidence).into_vec());
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_unpadded_prefix_matches_padded_mac() {
        let kb = Knowledgebase::from_yaml(
            r#"
network:
  mac_addresses:
    hyperv:
      prefixes:
        - prefix: "0:15:5d"
          confidence: high
"#,
        )
        .unwrap();

        // macOS `arp -a` drops leading zeros; both spellings normalize alike
        let findings = match_macs(&kb, &arp(&[("10.0.0.5", "0:15:5d:a:b:c"), ("10.0.0.6", "00:15:5D:01:02:03")]));
        let subjects: Vec<_> = findings.iter().map(|f| f.subject.as_str()).collect();
        assert_eq!(subjects, vec!["00:15:5d:0a:0b:0c", "00:15:5d:01:02:03"]);
        assert!(findings.iter().all(|f| f.value == "00:15:5d"));
    }

    #[test]
    fn test_no_match() {
        let findings = match_macs(&kb(), &arp(&[("10.0.0.9", "00:11:22:33:44:55")]));
        assert!(findings.is_empty());
        assert!(match_macs(&Knowledgebase::default(), &ArpEvidence::new()).is_empty());
    }
}
