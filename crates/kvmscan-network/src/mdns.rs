//! Native multicast-DNS resolution
//!
//! Sends a one-shot A + AAAA question (unicast response requested) to the
//! mDNS group from an ephemeral socket and reads answers for the queried
//! name. The caller bounds each resolution with its own timeout.

use kvmscan_core::{Error, MdnsResolver, ResolvedAddrs, Result};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

/// Well-known mDNS group and port
pub const MDNS_GROUP: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(224, 0, 0, 251), 5353);

/// How long to keep reading after the first answer, to pick up records
/// the responder split across packets
const LINGER: Duration = Duration::from_millis(250);

const RECV_BUFFER: usize = 9000;

/// Resolves `.local` names by querying the multicast group directly
#[derive(Debug, Clone)]
pub struct NativeMdnsResolver {
    group: SocketAddr,
}

impl NativeMdnsResolver {
    pub fn new() -> Self {
        Self {
            group: SocketAddr::V4(MDNS_GROUP),
        }
    }

    /// Send queries somewhere other than the multicast group
    pub fn with_group(mut self, group: SocketAddr) -> Self {
        self.group = group;
        self
    }
}

impl Default for NativeMdnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

async fn bind_socket() -> Result<UdpSocket> {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .map_err(|e| Error::ProbeSetup {
            modality: String::from("mdns"),
            message: format!("cannot bind query socket: {}", e),
        })
}

#[async_trait::async_trait]
impl MdnsResolver for NativeMdnsResolver {
    fn name(&self) -> &'static str {
        "native"
    }

    /// Confirm a query socket can be opened
    async fn prepare(&self) -> Result<()> {
        bind_socket().await.map(|_| ())
    }

    async fn resolve(&self, domain: &str) -> Result<ResolvedAddrs> {
        let name = wire::canonical_name(domain);
        let query = wire::build_query(&name)?;

        let socket = bind_socket().await?;
        if let Err(e) = socket.set_multicast_ttl_v4(255) {
            trace!(error = %e, "Could not set multicast TTL");
        }
        socket.send_to(&query, self.group).await?;
        trace!(domain = %name, group = %self.group, "Sent mDNS query");

        let mut buf = vec![0u8; RECV_BUFFER];
        let mut resolved = ResolvedAddrs::default();

        // Wait for the first answer; the caller's timeout ends this loop
        // when nobody responds.
        while resolved.is_empty() {
            let (len, src) = socket.recv_from(&mut buf).await?;
            match wire::parse_response(&buf[..len], &name) {
                Some(addrs) => merge(&mut resolved, addrs),
                None => trace!(%src, "Ignoring malformed mDNS packet"),
            }
        }

        // Pick up the other address family if it arrives separately
        while let Ok(Ok((len, _))) = tokio::time::timeout(LINGER, socket.recv_from(&mut buf)).await
        {
            if let Some(addrs) = wire::parse_response(&buf[..len], &name) {
                merge(&mut resolved, addrs);
            }
        }

        debug!(
            domain = %name,
            ipv4s = ?resolved.ipv4s,
            ipv6s = ?resolved.ipv6s,
            "Resolved via mDNS"
        );
        Ok(resolved)
    }
}

fn merge(into: &mut ResolvedAddrs, from: ResolvedAddrs) {
    for ip in from.ipv4s {
        if !into.ipv4s.contains(&ip) {
            into.ipv4s.push(ip);
        }
    }
    for ip in from.ipv6s {
        if !into.ipv6s.contains(&ip) {
            into.ipv6s.push(ip);
        }
    }
}

/// DNS message encoding and decoding for the subset mDNS resolution needs
pub mod wire {
    use kvmscan_core::{Error, ResolvedAddrs, Result};
    use std::net::{Ipv4Addr, Ipv6Addr};

    pub const TYPE_A: u16 = 1;
    pub const TYPE_AAAA: u16 = 28;
    const CLASS_IN: u16 = 1;
    /// Top bit of the question class: ask for a unicast response
    const UNICAST_RESPONSE: u16 = 0x8000;
    /// Top bit of the answer class: cache flush
    const CLASS_MASK: u16 = 0x7fff;
    const FLAG_RESPONSE: u16 = 0x8000;
    const HEADER_LEN: usize = 12;
    const MAX_LABEL: usize = 63;
    const MAX_POINTER_JUMPS: usize = 16;

    /// Lowercase, without a trailing dot
    pub fn canonical_name(domain: &str) -> String {
        domain.trim().trim_end_matches('.').to_lowercase()
    }

    /// Encode an A + AAAA question for `name`. The second question points
    /// back at the first name.
    pub fn build_query(name: &str) -> Result<Vec<u8>> {
        let mut packet = Vec::with_capacity(HEADER_LEN + name.len() + 16);

        // ID 0, standard query, two questions
        packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x02]);
        packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        for label in name.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL {
                return Err(Error::Parse(format!("invalid DNS name: {:?}", name)));
            }
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0x00);
        packet.extend_from_slice(&TYPE_A.to_be_bytes());
        packet.extend_from_slice(&(CLASS_IN | UNICAST_RESPONSE).to_be_bytes());

        // Pointer to the name at offset 12
        packet.extend_from_slice(&[0xc0, HEADER_LEN as u8]);
        packet.extend_from_slice(&TYPE_AAAA.to_be_bytes());
        packet.extend_from_slice(&(CLASS_IN | UNICAST_RESPONSE).to_be_bytes());

        Ok(packet)
    }

    /// Decode a possibly compressed name starting at `pos`. Returns the
    /// lowercased dotted name and the offset just past it.
    pub fn read_name(packet: &[u8], mut pos: usize) -> Option<(String, usize)> {
        let mut labels: Vec<String> = Vec::new();
        let mut resume = None;
        let mut jumps = 0;

        loop {
            let len = *packet.get(pos)? as usize;
            if len == 0 {
                pos += 1;
                break;
            }
            if len & 0xc0 == 0xc0 {
                let low = *packet.get(pos + 1)? as usize;
                if resume.is_none() {
                    resume = Some(pos + 2);
                }
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return None;
                }
                pos = ((len & 0x3f) << 8) | low;
                continue;
            }
            if len > MAX_LABEL {
                return None;
            }
            let label = packet.get(pos + 1..pos + 1 + len)?;
            labels.push(String::from_utf8_lossy(label).to_lowercase());
            pos += 1 + len;
        }

        Some((labels.join("."), resume.unwrap_or(pos)))
    }

    fn read_u16(packet: &[u8], pos: usize) -> Option<u16> {
        let bytes = packet.get(pos..pos + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Collect A/AAAA records for `name` from a response. Answer,
    /// authority and additional sections are all searched. Returns `None`
    /// for queries and truncated or malformed packets.
    pub fn parse_response(packet: &[u8], name: &str) -> Option<ResolvedAddrs> {
        if packet.len() < HEADER_LEN {
            return None;
        }
        let flags = read_u16(packet, 2)?;
        if flags & FLAG_RESPONSE == 0 {
            return None;
        }

        let questions = read_u16(packet, 4)?;
        let records = read_u16(packet, 6)? as usize
            + read_u16(packet, 8)? as usize
            + read_u16(packet, 10)? as usize;

        let mut pos = HEADER_LEN;
        for _ in 0..questions {
            let (_, next) = read_name(packet, pos)?;
            pos = next + 4;
        }

        let mut addrs = ResolvedAddrs::default();
        for _ in 0..records {
            let (owner, next) = read_name(packet, pos)?;
            let rtype = read_u16(packet, next)?;
            let class = read_u16(packet, next + 2)? & CLASS_MASK;
            let rdlen = read_u16(packet, next + 8)? as usize;
            let rdata = packet.get(next + 10..next + 10 + rdlen)?;
            pos = next + 10 + rdlen;

            if owner != name || class != CLASS_IN {
                continue;
            }
            match rtype {
                TYPE_A => {
                    if let Ok(octets) = <[u8; 4]>::try_from(rdata) {
                        let ip = Ipv4Addr::from(octets);
                        if !addrs.ipv4s.contains(&ip) {
                            addrs.ipv4s.push(ip);
                        }
                    }
                }
                TYPE_AAAA => {
                    if let Ok(octets) = <[u8; 16]>::try_from(rdata) {
                        let ip = Ipv6Addr::from(octets);
                        if !addrs.ipv6s.contains(&ip) {
                            addrs.ipv6s.push(ip);
                        }
                    }
                }
                _ => {}
            }
        }

        Some(addrs)
    }
}

#[cfg(test)]
mod tests {
    use super::wire::*;
    use super::*;
    use std::net::Ipv6Addr;

    fn encode_name(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for label in name.split('.') {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out
    }

    /// Response with no question, an A answer with the full name, and an
    /// AAAA answer that points back at it
    fn answer_packet(name: &str, v4: [u8; 4], v6: Ipv6Addr) -> Vec<u8> {
        let mut p = vec![0x00, 0x00, 0x84, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00];
        p.extend(encode_name(name));
        p.extend_from_slice(&TYPE_A.to_be_bytes());
        p.extend_from_slice(&[0x80, 0x01, 0x00, 0x00, 0x00, 0x78, 0x00, 0x04]);
        p.extend_from_slice(&v4);
        p.extend_from_slice(&[0xc0, 0x0c]);
        p.extend_from_slice(&TYPE_AAAA.to_be_bytes());
        p.extend_from_slice(&[0x80, 0x01, 0x00, 0x00, 0x00, 0x78, 0x00, 0x10]);
        p.extend_from_slice(&v6.octets());
        p
    }

    #[test]
    fn test_build_query() {
        let query = build_query("glkvm.local").unwrap();
        assert_eq!(&query[4..6], &[0x00, 0x02]);
        assert_eq!(&query[12..18], b"\x05glkvm");
        let (name, next) = read_name(&query, 12).unwrap();
        assert_eq!(name, "glkvm.local");
        assert_eq!(&query[next..next + 4], &[0x00, 0x01, 0x80, 0x01]);

        let (second, after) = read_name(&query, next + 4).unwrap();
        assert_eq!(second, "glkvm.local");
        assert_eq!(&query[after..after + 4], &[0x00, 0x1c, 0x80, 0x01]);
        assert_eq!(after + 4, query.len());
    }

    #[test]
    fn test_build_query_rejects_bad_names() {
        assert!(build_query("a..local").is_err());
        assert!(build_query(&format!("{}.local", "x".repeat(64))).is_err());
    }

    #[test]
    fn test_parse_response() {
        let v6: Ipv6Addr = "fe80::1".parse().unwrap();
        let packet = answer_packet("glkvm.local", [192, 168, 8, 1], v6);

        let addrs = parse_response(&packet, "glkvm.local").unwrap();
        assert_eq!(addrs.ipv4s, vec![Ipv4Addr::new(192, 168, 8, 1)]);
        assert_eq!(addrs.ipv6s, vec![v6]);

        let other = parse_response(&packet, "pikvm.local").unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_parse_rejects_queries_and_truncation() {
        let query = build_query("glkvm.local").unwrap();
        assert!(parse_response(&query, "glkvm.local").is_none());

        let v6: Ipv6Addr = "fe80::1".parse().unwrap();
        let packet = answer_packet("glkvm.local", [10, 0, 0, 5], v6);
        assert!(parse_response(&packet[..packet.len() - 3], "glkvm.local").is_none());
        assert!(parse_response(&packet[..8], "glkvm.local").is_none());
    }

    #[test]
    fn test_pointer_loop_is_rejected() {
        let packet = [0u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xc0, 0x0c];
        assert!(read_name(&packet, 12).is_none());
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name(" GLKVM.Local. "), "glkvm.local");
    }

    #[tokio::test]
    async fn test_resolve_against_local_responder() {
        let responder = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let responder_addr = responder.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (_, src) = responder.recv_from(&mut buf).await.unwrap();
            let v6: Ipv6Addr = "fe80::2".parse().unwrap();
            let packet = answer_packet("kvm1.local", [10, 0, 0, 5], v6);
            responder.send_to(&packet, src).await.unwrap();
        });

        let resolver = NativeMdnsResolver::new().with_group(responder_addr);
        let addrs = tokio::time::timeout(Duration::from_secs(3), resolver.resolve("KVM1.local"))
            .await
            .unwrap()
            .unwrap();
        server.await.unwrap();

        assert_eq!(addrs.ipv4s, vec![Ipv4Addr::new(10, 0, 0, 5)]);
        assert_eq!(addrs.ipv6s.len(), 1);
    }

    #[tokio::test]
    async fn test_prepare_binds_socket() {
        assert!(NativeMdnsResolver::new().prepare().await.is_ok());
    }
}
