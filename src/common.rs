//! Small shared vocabulary used by every handler: which side of a
//! conversation an event belongs to, and which network/transport layer it
//! rode in on. Kept separate from `dns`/`flow` so neither module depends on
//! the other just to share an enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a transaction/flow the observed host played.
///
/// For DNS, this is inferred from the *response's* direction (spec.md §3,
/// DNS Transaction): a reply flowing out to a client means the local host
/// was the server (`ToHost` is host-as-client... see `dns::transaction`
/// for the exact mapping used by `new_dns_transaction`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The monitored host was the client: traffic originates from it.
    FromHost,
    /// The monitored host was the server: traffic is destined to it.
    ToHost,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::FromHost => write!(f, "out"),
            Direction::ToHost => write!(f, "in"),
        }
    }
}

/// Network-layer family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum L3 {
    Ipv4,
    Ipv6,
}

impl fmt::Display for L3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            L3::Ipv4 => write!(f, "ipv4"),
            L3::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// Transport-layer protocol, collapsing everything but TCP/UDP into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum L4 {
    Tcp,
    Udp,
    Other(u8),
}

impl fmt::Display for L4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            L4::Tcp => write!(f, "tcp"),
            L4::Udp => write!(f, "udp"),
            L4::Other(proto) => write!(f, "other({proto})"),
        }
    }
}
