//! Certificate issuer, page title and favicon matcher
//!
//! Targets are probed with bounded concurrency. Each worker matches its own
//! evidence into a local list; lists are merged in target order afterwards.

use futures::stream::{self, StreamExt};
use kvmscan_common::digest::digest_matches;
use kvmscan_core::{Confidence, Finding, FindingSet, HttpEvidence, HttpProbe, Modality};
use kvmscan_indicators::Knowledgebase;
use tracing::{debug, info};

/// Match one target's HTTP evidence against every vendor.
///
/// Issuer and title tests are case-sensitive substring tests; favicon
/// digests compare exactly (hex case aside).
pub fn match_http_evidence(kb: &Knowledgebase, evidence: &HttpEvidence) -> Vec<Finding> {
    let mut findings = Vec::new();
    let subject = evidence.target.as_str();

    for (vendor, set) in kb.iter() {
        for org in &evidence.ssl_issuer_orgs {
            if set.ssl_issuer_substrings.iter().any(|s| org.contains(s.as_str())) {
                findings.push(Finding::new(vendor, Modality::Ssl, Confidence::High, org, subject));
            }
        }

        if let Some(title) = &evidence.page_title {
            if set.title_substrings.iter().any(|s| title.contains(s.as_str())) {
                findings.push(Finding::new(vendor, Modality::Title, Confidence::Medium, title, subject));
            }
        }

        if let Some(hash) = &evidence.favicon_hash {
            if set.favicon_hashes.iter().any(|h| digest_matches(hash, h)) {
                findings.push(Finding::new(vendor, Modality::Favicon, Confidence::High, hash, subject));
            }
        }
    }

    findings
}

/// Probe every target and match the results.
///
/// Returns the evidence per target (in target order) and the merged,
/// deduplicated findings. A target whose passes all failed simply
/// contributes empty evidence.
pub async fn match_http(
    kb: &Knowledgebase,
    probe: &dyn HttpProbe,
    targets: &[String],
    concurrency: usize,
) -> (Vec<HttpEvidence>, FindingSet) {
    let results: Vec<(HttpEvidence, Vec<Finding>)> = stream::iter(targets)
        .map(|target| async move {
            let evidence = probe.probe(target).await;
            let local = match_http_evidence(kb, &evidence);
            debug!(host = %target, matches = local.len(), "HTTP target probed");
            (evidence, local)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut evidence = Vec::with_capacity(results.len());
    let mut findings = FindingSet::new();
    for (target_evidence, local) in results {
        for finding in local {
            if findings.push(finding.clone()) {
                info!(
                    vendor = %finding.vendor,
                    modality = %finding.modality,
                    confidence = %finding.confidence,
                    value = %finding.value,
                    subject = %finding.subject,
                    "HTTP match found"
                );
            }
        }
        evidence.push(target_evidence);
    }

    (evidence, findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const INDICATORS: &str = r#"
http:
  ssl:
    glinet: "GL Technologies"
  title:
    glinet: ["GLKVM"]
    pikvm: ["PiKVM"]
  favicon:
    pikvm: ["5EB63BBBE01EEED093CB22BB8F5ACDC3"]
"#;

    fn kb() -> Knowledgebase {
        Knowledgebase::from_yaml(INDICATORS).unwrap()
    }

    struct FakeProbe(HashMap<String, HttpEvidence>);

    #[async_trait::async_trait]
    impl HttpProbe for FakeProbe {
        async fn probe(&self, target: &str) -> HttpEvidence {
            self.0
                .get(target)
                .cloned()
                .unwrap_or_else(|| HttpEvidence::empty(target))
        }
    }

    #[test]
    fn test_match_all_three_passes() {
        let evidence = HttpEvidence {
            target: String::from("10.0.0.9"),
            ssl_issuer_orgs: vec![String::from("GL Technologies (Shenzhen) Co., Ltd")],
            page_title: Some(String::from("GLKVM")),
            favicon_hash: None,
        };
        let findings = match_http_evidence(&kb(), &evidence);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].modality, Modality::Ssl);
        assert_eq!(findings[0].confidence, Confidence::High);
        assert_eq!(findings[0].value, "GL Technologies (Shenzhen) Co., Ltd");
        assert_eq!(findings[1].modality, Modality::Title);
        assert_eq!(findings[1].confidence, Confidence::Medium);
        assert!(findings.iter().all(|f| f.subject == "10.0.0.9"));
    }

    #[test]
    fn test_favicon_digest_match() {
        let evidence = HttpEvidence {
            target: String::from("pikvm.local"),
            favicon_hash: Some(kvmscan_common::digest::md5_hex(b"hello world")),
            ..Default::default()
        };
        let findings = match_http_evidence(&kb(), &evidence);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].vendor, "pikvm");
        assert_eq!(findings[0].modality, Modality::Favicon);
        assert_eq!(findings[0].confidence, Confidence::High);
    }

    #[test]
    fn test_substring_tests_are_case_sensitive() {
        let evidence = HttpEvidence {
            target: String::from("10.0.0.9"),
            ssl_issuer_orgs: vec![String::from("gl technologies")],
            page_title: Some(String::from("pikvm")),
            favicon_hash: None,
        };
        assert!(match_http_evidence(&kb(), &evidence).is_empty());
    }

    #[tokio::test]
    async fn test_failed_target_does_not_hide_others() {
        let mut responses = HashMap::new();
        responses.insert(
            String::from("10.0.0.9"),
            HttpEvidence {
                target: String::from("10.0.0.9"),
                ssl_issuer_orgs: vec![String::from("GL Technologies")],
                ..Default::default()
            },
        );
        let probe = FakeProbe(responses);
        let targets = vec![String::from("10.0.0.5"), String::from("10.0.0.9")];

        let (evidence, findings) = match_http(&kb(), &probe, &targets, 4).await;
        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[0].target, "10.0.0.5");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings.as_slice()[0].subject, "10.0.0.9");
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_runs() {
        let probe = FakeProbe(HashMap::new());
        let targets = vec![String::from("a.local")];
        let (evidence, findings) = match_http(&kb(), &probe, &targets, 0).await;
        assert_eq!(evidence.len(), 1);
        assert!(findings.is_empty());
    }
}
