//! mDNS resolution and HTTP target reconciliation
//!
//! A resolved domain is evidence of presence, not a finding. Its IPv4
//! addresses are removed from the ARP address set so the HTTP stage probes
//! the name once instead of probing the name and its address.

use futures::future::join_all;
use kvmscan_core::{MdnsEvidence, MdnsResolver};
use kvmscan_indicators::Knowledgebase;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

/// HTTP target list after reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    /// ARP addresses not explained by a resolved domain, then resolved domains
    pub targets: Vec<String>,
    /// ARP addresses dropped because a resolved domain bound them
    pub consumed_ips: BTreeSet<String>,
}

/// Resolve every configured domain concurrently, each under `limit`.
///
/// Returns the resolved domains (in query order) and the set of IPv4
/// addresses they bound. Unresolved domains are negative results, never
/// errors.
pub async fn resolve_and_reconcile(
    kb: &Knowledgebase,
    resolver: &dyn MdnsResolver,
    limit: Duration,
) -> (Vec<MdnsEvidence>, BTreeSet<String>) {
    let queries = kb.mdns_queries();

    let attempts = queries.into_iter().map(|(vendor, domain)| async move {
        match tokio::time::timeout(limit, resolver.resolve(&domain)).await {
            Ok(Ok(addrs)) if !addrs.is_empty() => {
                info!(
                    vendor = %vendor,
                    domain = %domain,
                    ipv4s = ?addrs.ipv4s,
                    "mDNS discovery result"
                );
                Some(MdnsEvidence::new(vendor, domain, addrs))
            }
            Ok(Ok(_)) => {
                debug!(domain = %domain, "mDNS query returned no addresses");
                None
            }
            Ok(Err(e)) => {
                debug!(domain = %domain, code = e.code(), "mDNS query failed: {}", e);
                None
            }
            Err(_) => {
                debug!(domain = %domain, timeout_secs = limit.as_secs(), "mDNS query timed out");
                None
            }
        }
    });

    let resolved: Vec<MdnsEvidence> = join_all(attempts).await.into_iter().flatten().collect();

    let resolved_ipv4s = resolved
        .iter()
        .flat_map(|evidence| evidence.ipv4s.iter().map(|ip| ip.to_string()))
        .collect();

    (resolved, resolved_ipv4s)
}

/// `arp_ips - resolved_ipv4s`, in discovery order, followed by every
/// resolved domain. Duplicates are dropped.
pub fn reconcile_targets(
    arp_ips: &[String],
    resolved_ipv4s: &BTreeSet<String>,
    resolved: &[MdnsEvidence],
) -> Reconciled {
    let mut reconciled = Reconciled::default();

    for ip in arp_ips {
        if resolved_ipv4s.contains(ip) {
            reconciled.consumed_ips.insert(ip.clone());
        } else if !reconciled.targets.contains(ip) {
            reconciled.targets.push(ip.clone());
        }
    }

    for evidence in resolved {
        if !reconciled.targets.contains(&evidence.domain) {
            reconciled.targets.push(evidence.domain.clone());
        }
    }

    if !reconciled.consumed_ips.is_empty() {
        debug!(consumed = ?reconciled.consumed_ips, "ARP addresses explained by mDNS");
    }
    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvmscan_core::{Error, ResolvedAddrs, Result};
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    struct FakeResolver {
        answers: HashMap<&'static str, Ipv4Addr>,
        hang: &'static str,
    }

    #[async_trait::async_trait]
    impl MdnsResolver for FakeResolver {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn resolve(&self, domain: &str) -> Result<ResolvedAddrs> {
            if domain == self.hang {
                std::future::pending::<()>().await;
            }
            match self.answers.get(domain) {
                Some(ip) => Ok(ResolvedAddrs {
                    ipv4s: vec![*ip],
                    ipv6s: Vec::new(),
                }),
                None => Err(Error::NotResolved {
                    domain: domain.to_string(),
                }),
            }
        }
    }

    fn kb() -> Knowledgebase {
        Knowledgebase::from_yaml(
            r#"
network:
  mdns:
    glinet: ["kvm1.local", "slow.local"]
    pikvm: ["pikvm.local"]
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolution_tolerates_failures_and_timeouts() {
        let resolver = FakeResolver {
            answers: HashMap::from([("kvm1.local", Ipv4Addr::new(10, 0, 0, 5))]),
            hang: "slow.local",
        };

        let (resolved, ipv4s) =
            resolve_and_reconcile(&kb(), &resolver, Duration::from_millis(100)).await;

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].domain, "kvm1.local");
        assert_eq!(resolved[0].vendor_hint, "glinet");
        assert_eq!(ipv4s, BTreeSet::from([String::from("10.0.0.5")]));
    }

    #[test]
    fn test_reconcile_targets() {
        let arp_ips = vec![String::from("10.0.0.5"), String::from("10.0.0.9")];
        let resolved = vec![MdnsEvidence::new(
            "glinet",
            "kvm1.local",
            ResolvedAddrs {
                ipv4s: vec![Ipv4Addr::new(10, 0, 0, 5)],
                ipv6s: Vec::new(),
            },
        )];
        let ipv4s = BTreeSet::from([String::from("10.0.0.5")]);

        let reconciled = reconcile_targets(&arp_ips, &ipv4s, &resolved);
        assert_eq!(reconciled.targets, vec!["10.0.0.9", "kvm1.local"]);
        assert!(reconciled.consumed_ips.contains("10.0.0.5"));
        assert_eq!(reconciled.consumed_ips.len(), 1);
    }

    #[test]
    fn test_reconcile_without_mdns() {
        let arp_ips = vec![String::from("10.0.0.5"), String::from("10.0.0.5")];
        let reconciled = reconcile_targets(&arp_ips, &BTreeSet::new(), &[]);
        assert_eq!(reconciled.targets, vec!["10.0.0.5"]);
        assert!(reconciled.consumed_ips.is_empty());
    }
}
