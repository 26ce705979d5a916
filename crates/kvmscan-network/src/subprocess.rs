//! mDNS resolution through the platform resolver command
//!
//! Used when the scan must not open sockets itself (`--no-mdns-listen`).
//! Linux goes through Avahi, macOS through Directory Services.

use kvmscan_common::command::{ensure_available, run_command};
use kvmscan_core::{Error, MdnsResolver, Platform, ResolvedAddrs, Result};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SubprocessMdnsResolver {
    platform: Platform,
    program: String,
    command_timeout: Duration,
}

impl SubprocessMdnsResolver {
    /// `None` when the platform has no supported resolver command
    pub fn for_platform(platform: Platform, command_timeout: Duration) -> Option<Self> {
        let program = match platform {
            Platform::Linux => "avahi-resolve-host-name",
            Platform::MacOs => "dscacheutil",
            Platform::Windows | Platform::Other => return None,
        };
        Some(Self {
            platform,
            program: program.to_string(),
            command_timeout,
        })
    }

    /// Use another binary that speaks the platform tool's arguments and output
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait::async_trait]
impl MdnsResolver for SubprocessMdnsResolver {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    /// Fails when the resolver command cannot be started
    async fn prepare(&self) -> Result<()> {
        ensure_available(&self.program, &[], self.command_timeout)
            .await
            .map_err(|e| Error::ProbeSetup {
                modality: String::from("mdns"),
                message: e.to_string(),
            })?;
        debug!(program = %self.program, "mDNS resolver command available");
        Ok(())
    }

    async fn resolve(&self, domain: &str) -> Result<ResolvedAddrs> {
        let addrs = match self.platform {
            Platform::Linux => {
                let out = run_command(&self.program, &["-4", domain], self.command_timeout).await?;
                parse_avahi(&out)
            }
            Platform::MacOs => {
                let out = run_command(
                    &self.program,
                    &["-q", "host", "-a", "name", domain],
                    self.command_timeout,
                )
                .await?;
                parse_dscacheutil(&out)
            }
            Platform::Windows | Platform::Other => ResolvedAddrs::default(),
        };

        if addrs.is_empty() {
            return Err(Error::NotResolved {
                domain: domain.to_string(),
            });
        }
        debug!(domain, ipv4s = ?addrs.ipv4s, "Resolved via {}", self.name());
        Ok(addrs)
    }
}

fn push(addrs: &mut ResolvedAddrs, ip: IpAddr) {
    match ip {
        IpAddr::V4(v4) if !addrs.ipv4s.contains(&v4) => addrs.ipv4s.push(v4),
        IpAddr::V6(v6) if !addrs.ipv6s.contains(&v6) => addrs.ipv6s.push(v6),
        _ => {}
    }
}

/// `glkvm.local\t192.168.8.1`, one line per address
pub fn parse_avahi(output: &str) -> ResolvedAddrs {
    let mut addrs = ResolvedAddrs::default();
    for line in output.lines() {
        if let Some(ip) = line
            .split_whitespace()
            .last()
            .and_then(|field| field.parse::<IpAddr>().ok())
        {
            push(&mut addrs, ip);
        }
    }
    addrs
}

/// `ip_address: 192.168.8.1` / `ipv6_address: fe80::1` records
pub fn parse_dscacheutil(output: &str) -> ResolvedAddrs {
    let mut addrs = ResolvedAddrs::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if !matches!(key.trim(), "ip_address" | "ipv6_address") {
            continue;
        }
        if let Ok(ip) = value.trim().parse::<IpAddr>() {
            push(&mut addrs, ip);
        }
    }
    addrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_avahi() {
        let addrs = parse_avahi("glkvm.local\t192.168.8.1\n");
        assert_eq!(addrs.ipv4s, vec![Ipv4Addr::new(192, 168, 8, 1)]);
        assert!(parse_avahi("Failed to resolve host name 'x.local': Timeout reached\n").is_empty());
    }

    #[test]
    fn test_parse_dscacheutil() {
        let out = "name: pikvm.local\nipv6_address: fe80::1\n\nname: pikvm.local\nip_address: 10.0.0.7\n";
        let addrs = parse_dscacheutil(out);
        assert_eq!(addrs.ipv4s, vec![Ipv4Addr::new(10, 0, 0, 7)]);
        assert_eq!(addrs.ipv6s.len(), 1);
    }

    #[test]
    fn test_platform_support() {
        let limit = Duration::from_secs(1);
        assert!(SubprocessMdnsResolver::for_platform(Platform::Linux, limit).is_some());
        assert!(SubprocessMdnsResolver::for_platform(Platform::MacOs, limit).is_some());
        assert!(SubprocessMdnsResolver::for_platform(Platform::Windows, limit).is_none());

        let linux = SubprocessMdnsResolver::for_platform(Platform::Linux, limit).unwrap();
        assert_eq!(linux.program(), "avahi-resolve-host-name");
        let macos = SubprocessMdnsResolver::for_platform(Platform::MacOs, limit).unwrap();
        assert_eq!(macos.program(), "dscacheutil");
    }

    #[tokio::test]
    async fn test_missing_tool_fails_setup() {
        let resolver = SubprocessMdnsResolver::for_platform(Platform::Linux, Duration::from_secs(2))
            .unwrap()
            .with_program("kvmscan-no-such-resolver");

        let err = resolver.prepare().await.unwrap_err();
        assert!(matches!(err, Error::ProbeSetup { ref modality, .. } if modality == "mdns"));
        assert!(!err.is_per_target());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_present_tool_passes_setup() {
        // `true` ignores its arguments, so only startability is checked
        let resolver = SubprocessMdnsResolver::for_platform(Platform::Linux, Duration::from_secs(2))
            .unwrap()
            .with_program("true");
        resolver.prepare().await.unwrap();
    }
}
