//! Flow-record types and the IP summarization rules the flow handler applies
//! before a Top-N update (spec.md §3 "Flow Packet"/"Flow Metric Tree", §4.4).

use std::net::IpAddr;

use crate::common::L4;
use crate::config::IpSummarization;

/// One flow record from an exporter observation (NetFlow/IPFIX/sFlow,
/// already decoded — wire decoding itself is out of scope per spec.md §1).
#[derive(Debug, Clone)]
pub struct FlowData {
    pub l4: L4,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    /// Ingress interface index, if the exporter reported one.
    pub if_in_index: Option<u32>,
    /// Egress interface index, if the exporter reported one.
    pub if_out_index: Option<u32>,
    pub tos: u8,
    pub packets: u64,
    pub octets: u64,
}

/// A bundle of flow records sharing one exporter observation (spec.md §3).
#[derive(Debug, Clone)]
pub struct FlowPacket {
    pub device_id: IpAddr,
    pub timestamp_secs: u64,
    pub records: Vec<FlowData>,
    pub filtered_count: u64,
}

const DSCP_SHIFT: u32 = 2;
const ECN_MASK: u8 = 0x3;

/// Upper 6 bits of the ToS byte (spec.md §GLOSSARY).
pub fn dscp(tos: u8) -> u8 {
    tos >> DSCP_SHIFT
}

/// Lower 2 bits of the ToS byte (spec.md §GLOSSARY).
pub fn ecn(tos: u8) -> u8 {
    tos & ECN_MASK
}

/// Canonical `min(a,b)/max(a,b)` conversation key so both directions of a
/// pair land in the same Top-N slot (spec.md §4.4 step 3).
pub fn canonical_conversation(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}/{b}")
    } else {
        format!("{b}/{a}")
    }
}

/// External collaborator for ASN lookups (spec.md §9: "pass the enrichment
/// interface by reference ... no process-wide state").
pub trait AsnResolver: Send + Sync {
    /// Returns the ASN label, or `"Unknown"` if the address isn't resolvable.
    fn lookup_asn(&self, ip: IpAddr) -> String;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoLabel {
    pub city: String,
    pub lat: f64,
    pub lon: f64,
}

pub trait GeoResolver: Send + Sync {
    fn lookup_city(&self, ip: IpAddr) -> Option<GeoLabel>;
}

fn summarize_by_subnet(ip: IpAddr, cidrs: &[ipnetwork::IpNetwork]) -> String {
    let mut wildcard = None;
    for cidr in cidrs {
        if cidr.contains(ip) {
            return cidr.to_string();
        }
        let is_wildcard = match cidr {
            ipnetwork::IpNetwork::V4(n) => n.ip().is_unspecified(),
            ipnetwork::IpNetwork::V6(n) => n.ip().is_unspecified(),
        };
        if is_wildcard && same_family(ip, cidr) && wildcard.is_none() {
            wildcard = Some(cidr);
        }
    }
    if let Some(cidr) = wildcard {
        let masked = match (ip, cidr) {
            (IpAddr::V4(addr), ipnetwork::IpNetwork::V4(n)) => {
                ipnetwork::IpNetwork::V4(ipnetwork::Ipv4Network::new(addr, n.prefix()).unwrap())
            }
            (IpAddr::V6(addr), ipnetwork::IpNetwork::V6(n)) => {
                ipnetwork::IpNetwork::V6(ipnetwork::Ipv6Network::new(addr, n.prefix()).unwrap())
            }
            _ => return ip.to_string(),
        };
        return masked.network().to_string() + "/" + &masked.prefix().to_string();
    }
    ip.to_string()
}

fn same_family(ip: IpAddr, cidr: &ipnetwork::IpNetwork) -> bool {
    matches!(
        (ip, cidr),
        (IpAddr::V4(_), ipnetwork::IpNetwork::V4(_)) | (IpAddr::V6(_), ipnetwork::IpNetwork::V6(_))
    )
}

/// Renders `ip` as a Top-N label per the configured summarization policy
/// (spec.md §4.4 "IP summarization").
pub fn summarize_ip(
    ip: IpAddr,
    summarization: &IpSummarization,
    exclude_from_summarization: &[ipnetwork::IpNetwork],
    asn: Option<&dyn AsnResolver>,
) -> String {
    if exclude_from_summarization.iter().any(|net| net.contains(ip)) {
        return ip.to_string();
    }

    match summarization {
        IpSummarization::None => ip.to_string(),
        IpSummarization::BySubnet { cidrs } => summarize_by_subnet(ip, cidrs),
        IpSummarization::ByAsn {
            exclude_unknown,
            exclude_prefixes,
            fallback_cidrs,
        } => {
            let label = asn.map(|r| r.lookup_asn(ip));
            match label {
                Some(asn_label) if !(*exclude_unknown && asn_label.eq_ignore_ascii_case("unknown")) => {
                    if exclude_prefixes.iter().any(|p| asn_label.starts_with(p.as_str())) {
                        summarize_by_subnet(ip, fallback_cidrs)
                    } else {
                        asn_label
                    }
                }
                _ => summarize_by_subnet(ip, fallback_cidrs),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipnetwork::IpNetwork;
    use std::str::FromStr;

    #[test]
    fn dscp_and_ecn_split_tos_byte() {
        // 0b101010_11: DSCP=0b101010=42, ECN=0b11=3
        let tos = 0b1010_1011;
        assert_eq!(dscp(tos), 42);
        assert_eq!(ecn(tos), 3);
    }

    #[test]
    fn conversation_key_is_order_independent() {
        let a = canonical_conversation("10.0.0.1:53", "10.0.0.2:9000");
        let b = canonical_conversation("10.0.0.2:9000", "10.0.0.1:53");
        assert_eq!(a, b);
    }

    #[test]
    fn none_summarization_returns_literal_address() {
        let ip = IpAddr::from_str("192.0.2.10").unwrap();
        assert_eq!(summarize_ip(ip, &IpSummarization::None, &[], None), "192.0.2.10");
    }

    #[test]
    fn subnet_summarization_matches_configured_cidr() {
        let ip = IpAddr::from_str("192.0.2.10").unwrap();
        let cidrs = vec![IpNetwork::from_str("192.0.2.0/24").unwrap()];
        let out = summarize_ip(
            ip,
            &IpSummarization::BySubnet { cidrs },
            &[],
            None,
        );
        assert_eq!(out, "192.0.2.0/24");
    }

    #[test]
    fn subnet_wildcard_buckets_unmatched_addresses_by_mask() {
        let ip = IpAddr::from_str("203.0.113.55").unwrap();
        let cidrs = vec![IpNetwork::from_str("0.0.0.0/16").unwrap()];
        let out = summarize_ip(ip, &IpSummarization::BySubnet { cidrs }, &[], None);
        assert_eq!(out, "203.0.0.0/16");
    }

    #[test]
    fn excluded_prefix_always_renders_literally() {
        let ip = IpAddr::from_str("10.0.0.5").unwrap();
        let exclude = vec![IpNetwork::from_str("10.0.0.0/8").unwrap()];
        let cidrs = vec![IpNetwork::from_str("10.0.0.0/24").unwrap()];
        let out = summarize_ip(ip, &IpSummarization::BySubnet { cidrs }, &exclude, None);
        assert_eq!(out, "10.0.0.5");
    }

    struct FixedAsn(&'static str);
    impl AsnResolver for FixedAsn {
        fn lookup_asn(&self, _ip: IpAddr) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn asn_summarization_uses_resolver_label() {
        let ip = IpAddr::from_str("198.51.100.1").unwrap();
        let resolver = FixedAsn("AS64500");
        let summarization = IpSummarization::ByAsn {
            exclude_unknown: true,
            exclude_prefixes: vec![],
            fallback_cidrs: vec![],
        };
        let out = summarize_ip(ip, &summarization, &[], Some(&resolver));
        assert_eq!(out, "AS64500");
    }

    #[test]
    fn unknown_asn_falls_back_to_subnet_when_excluded() {
        let ip = IpAddr::from_str("198.51.100.1").unwrap();
        let resolver = FixedAsn("Unknown");
        let summarization = IpSummarization::ByAsn {
            exclude_unknown: true,
            exclude_prefixes: vec![],
            fallback_cidrs: vec![IpNetwork::from_str("198.51.100.0/24").unwrap()],
        };
        let out = summarize_ip(ip, &summarization, &[], Some(&resolver));
        assert_eq!(out, "198.51.100.0/24");
    }

    #[test]
    fn excluded_asn_prefix_falls_back_to_subnet() {
        let ip = IpAddr::from_str("198.51.100.1").unwrap();
        let resolver = FixedAsn("AS64500-transit");
        let summarization = IpSummarization::ByAsn {
            exclude_unknown: false,
            exclude_prefixes: vec!["AS64500".to_string()],
            fallback_cidrs: vec![IpNetwork::from_str("198.51.100.0/24").unwrap()],
        };
        let out = summarize_ip(ip, &summarization, &[], Some(&resolver));
        assert_eq!(out, "198.51.100.0/24");
    }
}
