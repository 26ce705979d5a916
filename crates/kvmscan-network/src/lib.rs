//! kvmscan Network - Link-layer and multicast-DNS probe adapters
//!
//! This crate provides:
//! - ARP table collection (`arp -a`) with per-OS parse strategies
//! - Native mDNS resolution over the multicast group
//! - mDNS resolution through the platform resolver command

pub mod arp;
pub mod mdns;
pub mod subprocess;

pub use arp::{parser_for, ArpTableParser, ArpTableProbe, UnixArpParser, WindowsArpParser};
pub use mdns::{NativeMdnsResolver, MDNS_GROUP};
pub use subprocess::SubprocessMdnsResolver;
