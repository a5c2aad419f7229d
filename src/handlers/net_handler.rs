//! NET handler: the cheapest of the three handlers (spec.md §2 component
//! table, 4% budget share). Per decoded L3/L4 event it only bumps plain
//! counters split by family, protocol, and direction — no deep-sample-gated
//! sketches (SPEC_FULL.md §4.9).

use crate::bucket::Mergeable;
use crate::common::{Direction, L3, L4};
use crate::config::WindowConfig;
use crate::metric::{Counter, LabelMap};
use crate::period_manager::PeriodManager;

pub struct NetMetricsBucket {
    pub ipv4: Counter,
    pub ipv6: Counter,
    pub tcp: Counter,
    pub udp: Counter,
    pub other_l4: Counter,

    pub in_bytes: Counter,
    pub out_bytes: Counter,
    pub in_packets: Counter,
    pub out_packets: Counter,
}

impl NetMetricsBucket {
    pub fn new() -> Self {
        Self {
            ipv4: Counter::new("net", &["wire_packets", "ipv4"], "Total packets observed over IPv4"),
            ipv6: Counter::new("net", &["wire_packets", "ipv6"], "Total packets observed over IPv6"),
            tcp: Counter::new("net", &["wire_packets", "tcp"], "Total packets observed using TCP"),
            udp: Counter::new("net", &["wire_packets", "udp"], "Total packets observed using UDP"),
            other_l4: Counter::new("net", &["wire_packets", "other_l4"], "Total packets using a transport protocol other than TCP/UDP"),

            in_bytes: Counter::new("net", &["bytes", "in"], "Total bytes received by the monitored host"),
            out_bytes: Counter::new("net", &["bytes", "out"], "Total bytes sent by the monitored host"),
            in_packets: Counter::new("net", &["packets", "in"], "Total packets received by the monitored host"),
            out_packets: Counter::new("net", &["packets", "out"], "Total packets sent by the monitored host"),
        }
    }

    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        self.ipv4.to_json(&mut out);
        self.ipv6.to_json(&mut out);
        self.tcp.to_json(&mut out);
        self.udp.to_json(&mut out);
        self.other_l4.to_json(&mut out);
        self.in_bytes.to_json(&mut out);
        self.out_bytes.to_json(&mut out);
        self.in_packets.to_json(&mut out);
        self.out_packets.to_json(&mut out);
        out
    }

    pub fn to_prometheus(&self, labels: &LabelMap) -> String {
        let mut out = String::new();
        self.ipv4.to_prometheus(&mut out, labels);
        self.ipv6.to_prometheus(&mut out, labels);
        self.tcp.to_prometheus(&mut out, labels);
        self.udp.to_prometheus(&mut out, labels);
        self.other_l4.to_prometheus(&mut out, labels);
        self.in_bytes.to_prometheus(&mut out, labels);
        self.out_bytes.to_prometheus(&mut out, labels);
        self.in_packets.to_prometheus(&mut out, labels);
        self.out_packets.to_prometheus(&mut out, labels);
        out
    }
}

impl Default for NetMetricsBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl Mergeable for NetMetricsBucket {
    fn merge(&mut self, other: &Self) {
        self.ipv4.merge(&other.ipv4);
        self.ipv6.merge(&other.ipv6);
        self.tcp.merge(&other.tcp);
        self.udp.merge(&other.udp);
        self.other_l4.merge(&other.other_l4);
        self.in_bytes.merge(&other.in_bytes);
        self.out_bytes.merge(&other.out_bytes);
        self.in_packets.merge(&other.in_packets);
        self.out_packets.merge(&other.out_packets);
    }
}

impl Clone for NetMetricsBucket {
    fn clone(&self) -> Self {
        Self {
            ipv4: self.ipv4.clone(),
            ipv6: self.ipv6.clone(),
            tcp: self.tcp.clone(),
            udp: self.udp.clone(),
            other_l4: self.other_l4.clone(),
            in_bytes: self.in_bytes.clone(),
            out_bytes: self.out_bytes.clone(),
            in_packets: self.in_packets.clone(),
            out_packets: self.out_packets.clone(),
        }
    }
}

pub struct NetHandler {
    pub period: PeriodManager<NetMetricsBucket>,
}

impl NetHandler {
    pub fn new(window: WindowConfig) -> Self {
        Self {
            period: PeriodManager::new(window, NetMetricsBucket::new()),
        }
    }

    /// Folds one decoded L3/L4 event into the live bucket. `bytes`/`packets`
    /// are the event's contribution, attributed to `direction`.
    pub fn process_event(&mut self, direction: Direction, l3: L3, l4: L4, bytes: u64, packets: u64) {
        let bucket = self.period.live();
        let mut b = bucket.write();
        b.meta.record_event(false);

        match l3 {
            L3::Ipv4 => b.metrics.ipv4.inc(),
            L3::Ipv6 => b.metrics.ipv6.inc(),
        }
        match l4 {
            L4::Tcp => b.metrics.tcp.inc(),
            L4::Udp => b.metrics.udp.inc(),
            L4::Other(_) => b.metrics.other_l4.inc(),
        }

        match direction {
            Direction::ToHost => {
                b.metrics.in_bytes.add(bytes);
                b.metrics.in_packets.add(packets);
            }
            Direction::FromHost => {
                b.metrics.out_bytes.add(bytes);
                b.metrics.out_packets.add(packets);
            }
        }
    }

    pub fn rotate(&mut self) {
        self.period.rotate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingress_event_bumps_in_counters_and_family() {
        let mut handler = NetHandler::new(WindowConfig::default());
        handler.process_event(Direction::ToHost, L3::Ipv4, L4::Tcp, 1500, 1);

        let bucket = handler.period.live();
        let b = bucket.read();
        assert_eq!(b.metrics.in_bytes.get(), 1500);
        assert_eq!(b.metrics.in_packets.get(), 1);
        assert_eq!(b.metrics.out_bytes.get(), 0);
        assert_eq!(b.metrics.ipv4.get(), 1);
        assert_eq!(b.metrics.tcp.get(), 1);
    }

    #[test]
    fn egress_event_bumps_out_counters() {
        let mut handler = NetHandler::new(WindowConfig::default());
        handler.process_event(Direction::FromHost, L3::Ipv6, L4::Udp, 64, 1);

        let bucket = handler.period.live();
        let b = bucket.read();
        assert_eq!(b.metrics.out_bytes.get(), 64);
        assert_eq!(b.metrics.out_packets.get(), 1);
        assert_eq!(b.metrics.ipv6.get(), 1);
        assert_eq!(b.metrics.udp.get(), 1);
    }

    #[test]
    fn rotate_seals_and_resets_live_bucket() {
        let mut handler = NetHandler::new(WindowConfig::default());
        handler.process_event(Direction::ToHost, L3::Ipv4, L4::Tcp, 100, 1);
        handler.rotate();
        let bucket = handler.period.live();
        assert_eq!(bucket.read().metrics.in_bytes.get(), 0);
        assert_eq!(handler.period.bucket(1).unwrap().read().metrics.in_bytes.get(), 100);
    }
}
