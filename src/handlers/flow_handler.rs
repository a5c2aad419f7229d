//! Flow handler: a two-level device → interface metric tree (spec.md §3
//! "Flow Metric Tree", §4.4). Grounded in the original's `FlowMetricsBucket`/
//! `FlowDevice`/`FlowInterface` (`original_source/src/handlers/flow/
//! FlowStreamHandler.cpp`), restructured around owned `FxHashMap`s instead of
//! `unique_ptr`-keyed maps.

use std::collections::VecDeque;
use std::net::IpAddr;

use rustc_hash::FxHashMap;

use crate::bucket::Mergeable;
use crate::common::L4;
use crate::config::{FlowHandlerConfig, IpSummarization, SketchConfig};
use crate::flow::{canonical_conversation, dscp, ecn, summarize_ip, AsnResolver, FlowData, FlowPacket, GeoResolver};
use crate::metric::{Counter, LabelMap};
use crate::period_manager::PeriodManager;
use crate::sketches::{Cardinality, TopN};

/// Which side of a flow record an event belongs to: ingress traffic bumps
/// the `in_*` counters/Top-Ns on the ingress interface, egress traffic bumps
/// `out_*` on the egress interface. A transit flow with both set contributes
/// to both interfaces (spec.md §4.4 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    In,
    Out,
}

#[derive(Debug)]
pub struct ProtocolCounters {
    pub total: Counter,
    pub ipv4: Counter,
    pub ipv6: Counter,
    pub tcp: Counter,
    pub udp: Counter,
    pub other_l4: Counter,
}

impl ProtocolCounters {
    fn new(direction: &'static str) -> Self {
        Self {
            total: Counter::new("flow", &["counters", direction, "total"], "Total flow traffic for this direction"),
            ipv4: Counter::new("flow", &["counters", direction, "ipv4"], "Total flow traffic over IPv4 for this direction"),
            ipv6: Counter::new("flow", &["counters", direction, "ipv6"], "Total flow traffic over IPv6 for this direction"),
            tcp: Counter::new("flow", &["counters", direction, "tcp"], "Total flow traffic using TCP for this direction"),
            udp: Counter::new("flow", &["counters", direction, "udp"], "Total flow traffic using UDP for this direction"),
            other_l4: Counter::new("flow", &["counters", direction, "other_l4"], "Total flow traffic using a non-TCP/UDP transport for this direction"),
        }
    }

    fn add(&mut self, ip: IpAddr, l4: L4, amount: u64) {
        self.total.add(amount);
        match ip {
            IpAddr::V4(_) => self.ipv4.add(amount),
            IpAddr::V6(_) => self.ipv6.add(amount),
        }
        match l4 {
            L4::Tcp => self.tcp.add(amount),
            L4::Udp => self.udp.add(amount),
            L4::Other(_) => self.other_l4.add(amount),
        }
    }

    fn merge(&mut self, other: &Self) {
        self.total.merge(&other.total);
        self.ipv4.merge(&other.ipv4);
        self.ipv6.merge(&other.ipv6);
        self.tcp.merge(&other.tcp);
        self.udp.merge(&other.udp);
        self.other_l4.merge(&other.other_l4);
    }

    fn clone_counters(&self) -> Self {
        Self {
            total: self.total.clone(),
            ipv4: self.ipv4.clone(),
            ipv6: self.ipv6.clone(),
            tcp: self.tcp.clone(),
            udp: self.udp.clone(),
            other_l4: self.other_l4.clone(),
        }
    }

    fn to_json(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        self.total.to_json(out);
        self.ipv4.to_json(out);
        self.ipv6.to_json(out);
        self.tcp.to_json(out);
        self.udp.to_json(out);
        self.other_l4.to_json(out);
    }

    fn to_prometheus(&self, out: &mut String, labels: &LabelMap) {
        self.total.to_prometheus(out, labels);
        self.ipv4.to_prometheus(out, labels);
        self.ipv6.to_prometheus(out, labels);
        self.tcp.to_prometheus(out, labels);
        self.udp.to_prometheus(out, labels);
        self.other_l4.to_prometheus(out, labels);
    }
}

#[derive(Debug)]
pub struct DirectionTopN {
    pub top_src_ip: TopN<String>,
    pub top_dst_ip: TopN<String>,
    pub top_src_port: TopN<u16>,
    pub top_dst_port: TopN<u16>,
    pub top_src_ip_port: TopN<String>,
    pub top_dst_ip_port: TopN<String>,
    pub top_dscp: TopN<u8>,
    pub top_ecn: TopN<u8>,
    pub top_conversations: TopN<String>,
    pub top_geo_city: TopN<String>,
    pub top_asn: TopN<String>,
}

impl DirectionTopN {
    fn new(direction: &'static str, n: usize, pct: f64) -> Self {
        Self {
            top_src_ip: TopN::new("flow", &[direction, "top_src_ip"], "Top source IPs", n, pct),
            top_dst_ip: TopN::new("flow", &[direction, "top_dst_ip"], "Top destination IPs", n, pct),
            top_src_port: TopN::new("flow", &[direction, "top_src_port"], "Top source ports", n, pct),
            top_dst_port: TopN::new("flow", &[direction, "top_dst_port"], "Top destination ports", n, pct),
            top_src_ip_port: TopN::new("flow", &[direction, "top_src_ip_port"], "Top source IP:port pairs", n, pct),
            top_dst_ip_port: TopN::new("flow", &[direction, "top_dst_ip_port"], "Top destination IP:port pairs", n, pct),
            top_dscp: TopN::new("flow", &[direction, "top_dscp"], "Top DSCP values", n, pct),
            top_ecn: TopN::new("flow", &[direction, "top_ecn"], "Top ECN values", n, pct),
            top_conversations: TopN::new("flow", &[direction, "top_conversations"], "Top conversations", n, pct),
            top_geo_city: TopN::new("flow", &[direction, "top_geo_city"], "Top source cities (enrichment)", n, pct),
            top_asn: TopN::new("flow", &[direction, "top_asn"], "Top source ASNs (enrichment)", n, pct),
        }
    }

    fn merge(&mut self, other: &Self) {
        self.top_src_ip.merge(&other.top_src_ip);
        self.top_dst_ip.merge(&other.top_dst_ip);
        self.top_src_port.merge(&other.top_src_port);
        self.top_dst_port.merge(&other.top_dst_port);
        self.top_src_ip_port.merge(&other.top_src_ip_port);
        self.top_dst_ip_port.merge(&other.top_dst_ip_port);
        self.top_dscp.merge(&other.top_dscp);
        self.top_ecn.merge(&other.top_ecn);
        self.top_conversations.merge(&other.top_conversations);
        self.top_geo_city.merge(&other.top_geo_city);
        self.top_asn.merge(&other.top_asn);
    }

    fn clone_topn(&self) -> Self {
        Self {
            top_src_ip: self.top_src_ip.clone(),
            top_dst_ip: self.top_dst_ip.clone(),
            top_src_port: self.top_src_port.clone(),
            top_dst_port: self.top_dst_port.clone(),
            top_src_ip_port: self.top_src_ip_port.clone(),
            top_dst_ip_port: self.top_dst_ip_port.clone(),
            top_dscp: self.top_dscp.clone(),
            top_ecn: self.top_ecn.clone(),
            top_conversations: self.top_conversations.clone(),
            top_geo_city: self.top_geo_city.clone(),
            top_asn: self.top_asn.clone(),
        }
    }

    fn to_json(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        self.top_src_ip.to_json(out);
        self.top_dst_ip.to_json(out);
        self.top_src_port.to_json(out);
        self.top_dst_port.to_json(out);
        self.top_src_ip_port.to_json(out);
        self.top_dst_ip_port.to_json(out);
        self.top_dscp.to_json(out);
        self.top_ecn.to_json(out);
        self.top_conversations.to_json(out);
        if !self.top_geo_city.is_empty() {
            self.top_geo_city.to_json(out);
        }
        if !self.top_asn.is_empty() {
            self.top_asn.to_json(out);
        }
    }

    fn to_prometheus(&self, out: &mut String, labels: &LabelMap) {
        self.top_src_ip.to_prometheus(out, labels);
        self.top_dst_ip.to_prometheus(out, labels);
        self.top_src_port.to_prometheus(out, labels);
        self.top_dst_port.to_prometheus(out, labels);
        self.top_src_ip_port.to_prometheus(out, labels);
        self.top_dst_ip_port.to_prometheus(out, labels);
        self.top_dscp.to_prometheus(out, labels);
        self.top_ecn.to_prometheus(out, labels);
        self.top_conversations.to_prometheus(out, labels);
        self.top_geo_city.to_prometheus(out, labels);
        self.top_asn.to_prometheus(out, labels);
    }
}

pub struct FlowInterfaceBucket {
    pub in_bytes: ProtocolCounters,
    pub in_packets: ProtocolCounters,
    pub out_bytes: ProtocolCounters,
    pub out_packets: ProtocolCounters,

    pub in_bytes_top: DirectionTopN,
    pub in_packets_top: DirectionTopN,
    pub out_bytes_top: DirectionTopN,
    pub out_packets_top: DirectionTopN,

    pub src_ip_cardinality: Cardinality,
    pub dst_ip_cardinality: Cardinality,
    pub conversations_cardinality: Cardinality,
}

impl FlowInterfaceBucket {
    fn new(sketches: &SketchConfig) -> Self {
        let n = sketches.topn_count;
        let pct = sketches.topn_percentile_threshold;
        let p = sketches.cardinality_precision;
        Self {
            in_bytes: ProtocolCounters::new("in_bytes"),
            in_packets: ProtocolCounters::new("in_packets"),
            out_bytes: ProtocolCounters::new("out_bytes"),
            out_packets: ProtocolCounters::new("out_packets"),

            in_bytes_top: DirectionTopN::new("in_bytes", n, pct),
            in_packets_top: DirectionTopN::new("in_packets", n, pct),
            out_bytes_top: DirectionTopN::new("out_bytes", n, pct),
            out_packets_top: DirectionTopN::new("out_packets", n, pct),

            src_ip_cardinality: Cardinality::new("flow", &["cardinality", "src_ip"], "Cardinality of unique source IPs", p),
            dst_ip_cardinality: Cardinality::new("flow", &["cardinality", "dst_ip"], "Cardinality of unique destination IPs", p),
            conversations_cardinality: Cardinality::new("flow", &["cardinality", "conversations"], "Cardinality of unique conversations", p),
        }
    }

    fn merge(&mut self, other: &Self) {
        self.in_bytes.merge(&other.in_bytes);
        self.in_packets.merge(&other.in_packets);
        self.out_bytes.merge(&other.out_bytes);
        self.out_packets.merge(&other.out_packets);
        self.in_bytes_top.merge(&other.in_bytes_top);
        self.in_packets_top.merge(&other.in_packets_top);
        self.out_bytes_top.merge(&other.out_bytes_top);
        self.out_packets_top.merge(&other.out_packets_top);
        self.src_ip_cardinality.merge(&other.src_ip_cardinality);
        self.dst_ip_cardinality.merge(&other.dst_ip_cardinality);
        self.conversations_cardinality.merge(&other.conversations_cardinality);
    }

    fn clone_bucket(&self) -> Self {
        Self {
            in_bytes: self.in_bytes.clone_counters(),
            in_packets: self.in_packets.clone_counters(),
            out_bytes: self.out_bytes.clone_counters(),
            out_packets: self.out_packets.clone_counters(),
            in_bytes_top: self.in_bytes_top.clone_topn(),
            in_packets_top: self.in_packets_top.clone_topn(),
            out_bytes_top: self.out_bytes_top.clone_topn(),
            out_packets_top: self.out_packets_top.clone_topn(),
            src_ip_cardinality: self.src_ip_cardinality.clone(),
            dst_ip_cardinality: self.dst_ip_cardinality.clone(),
            conversations_cardinality: self.conversations_cardinality.clone(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        self.in_bytes.to_json(&mut out);
        self.in_packets.to_json(&mut out);
        self.out_bytes.to_json(&mut out);
        self.out_packets.to_json(&mut out);
        self.in_bytes_top.to_json(&mut out);
        self.in_packets_top.to_json(&mut out);
        self.out_bytes_top.to_json(&mut out);
        self.out_packets_top.to_json(&mut out);
        self.src_ip_cardinality.to_json(&mut out);
        self.dst_ip_cardinality.to_json(&mut out);
        self.conversations_cardinality.to_json(&mut out);
        serde_json::Value::Object(out)
    }

    fn to_prometheus(&self, labels: &LabelMap) -> String {
        let mut out = String::new();
        self.in_bytes.to_prometheus(&mut out, labels);
        self.in_packets.to_prometheus(&mut out, labels);
        self.out_bytes.to_prometheus(&mut out, labels);
        self.out_packets.to_prometheus(&mut out, labels);
        self.in_bytes_top.to_prometheus(&mut out, labels);
        self.in_packets_top.to_prometheus(&mut out, labels);
        self.out_bytes_top.to_prometheus(&mut out, labels);
        self.out_packets_top.to_prometheus(&mut out, labels);
        self.src_ip_cardinality.to_prometheus(&mut out, labels);
        self.dst_ip_cardinality.to_prometheus(&mut out, labels);
        self.conversations_cardinality.to_prometheus(&mut out, labels);
        out
    }
}

pub struct FlowDeviceBucket {
    pub interfaces: FxHashMap<u32, FlowInterfaceBucket>,
    pub top_in_ifindex_bytes: TopN<u32>,
    pub top_in_ifindex_packets: TopN<u32>,
    pub top_out_ifindex_bytes: TopN<u32>,
    pub top_out_ifindex_packets: TopN<u32>,
    pub filtered: Counter,
}

impl FlowDeviceBucket {
    fn new(sketches: &SketchConfig) -> Self {
        let n = sketches.topn_count;
        let pct = sketches.topn_percentile_threshold;
        Self {
            interfaces: FxHashMap::default(),
            top_in_ifindex_bytes: TopN::new("flow", &["top_in_ifindex_bytes"], "Top ingress interfaces by bytes", n, pct),
            top_in_ifindex_packets: TopN::new("flow", &["top_in_ifindex_packets"], "Top ingress interfaces by packets", n, pct),
            top_out_ifindex_bytes: TopN::new("flow", &["top_out_ifindex_bytes"], "Top egress interfaces by bytes", n, pct),
            top_out_ifindex_packets: TopN::new("flow", &["top_out_ifindex_packets"], "Top egress interfaces by packets", n, pct),
            filtered: Counter::new("flow", &["counters", "filtered"], "Total flow records dropped by filters"),
        }
    }
}

impl Mergeable for FlowDeviceBucket {
    fn merge(&mut self, other: &Self) {
        for (idx, iface) in &other.interfaces {
            self.interfaces
                .entry(*idx)
                .and_modify(|existing| existing.merge(iface))
                .or_insert_with(|| iface.clone_bucket());
        }
        self.top_in_ifindex_bytes.merge(&other.top_in_ifindex_bytes);
        self.top_in_ifindex_packets.merge(&other.top_in_ifindex_packets);
        self.top_out_ifindex_bytes.merge(&other.top_out_ifindex_bytes);
        self.top_out_ifindex_packets.merge(&other.top_out_ifindex_packets);
        self.filtered.merge(&other.filtered);
    }
}

impl Clone for FlowDeviceBucket {
    fn clone(&self) -> Self {
        Self {
            interfaces: self.interfaces.iter().map(|(k, v)| (*k, v.clone_bucket())).collect(),
            top_in_ifindex_bytes: self.top_in_ifindex_bytes.clone(),
            top_in_ifindex_packets: self.top_in_ifindex_packets.clone(),
            top_out_ifindex_bytes: self.top_out_ifindex_bytes.clone(),
            top_out_ifindex_packets: self.top_out_ifindex_packets.clone(),
            filtered: self.filtered.clone(),
        }
    }
}

/// Root of the flow handler's metrics tree (spec.md §3 "Flow Metric Tree").
#[derive(Default)]
pub struct FlowMetricsBucket {
    pub devices: FxHashMap<String, FlowDeviceBucket>,
}

impl Mergeable for FlowMetricsBucket {
    fn merge(&mut self, other: &Self) {
        for (device_id, device) in &other.devices {
            self.devices
                .entry(device_id.clone())
                .and_modify(|existing| existing.merge(device))
                .or_insert_with(|| device.clone());
        }
    }
}

impl Clone for FlowMetricsBucket {
    fn clone(&self) -> Self {
        Self {
            devices: self.devices.clone(),
        }
    }
}

impl FlowMetricsBucket {
    pub fn to_json(&self) -> serde_json::Value {
        let mut devices = serde_json::Map::new();
        for (device_id, device) in &self.devices {
            let mut interfaces = serde_json::Map::new();
            for (idx, iface) in &device.interfaces {
                interfaces.insert(idx.to_string(), iface.to_json());
            }
            let mut top_ifindex = serde_json::Map::new();
            device.top_in_ifindex_bytes.to_json(&mut top_ifindex);
            device.top_in_ifindex_packets.to_json(&mut top_ifindex);
            device.top_out_ifindex_bytes.to_json(&mut top_ifindex);
            device.top_out_ifindex_packets.to_json(&mut top_ifindex);

            let mut device_obj = serde_json::Map::new();
            device_obj.insert("interfaces".to_string(), serde_json::Value::Object(interfaces));
            device_obj.insert("top_ifindex".to_string(), serde_json::Value::Object(top_ifindex));
            device_obj.insert("filtered".to_string(), serde_json::json!(device.filtered.get()));
            devices.insert(device_id.clone(), serde_json::Value::Object(device_obj));
        }
        serde_json::json!({ "devices": devices })
    }

    pub fn to_prometheus(&self, labels: &LabelMap) -> String {
        let mut out = String::new();
        for (device_id, device) in &self.devices {
            let mut device_labels = labels.clone();
            device_labels.insert("device".to_string(), device_id.clone());
            device.filtered.to_prometheus(&mut out, &device_labels);
            device.top_in_ifindex_bytes.to_prometheus(&mut out, &device_labels);
            device.top_in_ifindex_packets.to_prometheus(&mut out, &device_labels);
            device.top_out_ifindex_bytes.to_prometheus(&mut out, &device_labels);
            device.top_out_ifindex_packets.to_prometheus(&mut out, &device_labels);

            for (idx, iface) in &device.interfaces {
                let mut iface_labels = device_labels.clone();
                iface_labels.insert("device_interface".to_string(), idx.to_string());
                out.push_str(&iface.to_prometheus(&iface_labels));
            }
        }
        out
    }
}

const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (20, "ftp-data"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "domain"),
    (80, "http"),
    (110, "pop3"),
    (123, "ntp"),
    (143, "imap"),
    (443, "https"),
    (993, "imaps"),
    (995, "pop3s"),
    (3306, "mysql"),
    (5432, "postgresql"),
    (6379, "redis"),
    (8080, "http-alt"),
];

fn well_known_service_name(port: u16) -> Option<&'static str> {
    WELL_KNOWN_PORTS.iter().find(|(p, _)| *p == port).map(|(_, name)| *name)
}

/// Bounded port→service-name cache (spec.md §4.4 "resolved to service name
/// via LRU of configured size").
struct ServiceNameCache {
    capacity: usize,
    order: VecDeque<u16>,
    entries: FxHashMap<u16, String>,
}

impl ServiceNameCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: FxHashMap::default(),
        }
    }

    fn resolve(&mut self, port: u16) -> String {
        if let Some(name) = self.entries.get(&port) {
            return name.clone();
        }
        let name = well_known_service_name(port)
            .map(str::to_string)
            .unwrap_or_else(|| port.to_string());

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(port);
        self.entries.insert(port, name.clone());
        name
    }
}

pub struct FlowHandler {
    pub config: FlowHandlerConfig,
    pub period: PeriodManager<FlowMetricsBucket>,
    service_cache: ServiceNameCache,
    asn: Option<Box<dyn AsnResolver>>,
    geo: Option<Box<dyn GeoResolver>>,
}

impl FlowHandler {
    pub fn new(config: FlowHandlerConfig) -> Self {
        let service_cache = ServiceNameCache::new(config.service_name_cache_size);
        let period = PeriodManager::new(config.window.clone(), FlowMetricsBucket::default());
        Self {
            config,
            period,
            service_cache,
            asn: None,
            geo: None,
        }
    }

    pub fn with_asn_resolver(mut self, resolver: Box<dyn AsnResolver>) -> Self {
        self.asn = Some(resolver);
        self
    }

    pub fn with_geo_resolver(mut self, resolver: Box<dyn GeoResolver>) -> Self {
        self.geo = Some(resolver);
        self
    }

    /// Folds one exporter observation into the live bucket (spec.md §4.4).
    pub fn process_flow(&mut self, packet: &FlowPacket) {
        let device_key = packet.device_id.to_string();
        let sketches = self.config.sketches.clone();

        {
            let bucket = self.period.live();
            let mut b = bucket.write();
            let device = b
                .metrics
                .devices
                .entry(device_key.clone())
                .or_insert_with(|| FlowDeviceBucket::new(&sketches));
            device.filtered.add(packet.filtered_count);
        }

        for record in &packet.records {
            let deep = self.period.should_deep_sample();
            let src_service = self.service_cache.resolve(record.src_port);
            let dst_service = self.service_cache.resolve(record.dst_port);
            let src_label = summarize_ip(
                record.src_ip,
                &self.config.summarization,
                &self.config.exclude_from_summarization,
                self.asn.as_deref(),
            );
            let dst_label = summarize_ip(
                record.dst_ip,
                &self.config.summarization,
                &self.config.exclude_from_summarization,
                self.asn.as_deref(),
            );

            let bucket = self.period.live();
            let mut b = bucket.write();
            b.meta.record_event(deep);
            let device = b
                .metrics
                .devices
                .entry(device_key.clone())
                .or_insert_with(|| FlowDeviceBucket::new(&sketches));

            if let Some(idx) = record.if_in_index {
                let iface = device.interfaces.entry(idx).or_insert_with(|| FlowInterfaceBucket::new(&sketches));
                iface.in_bytes.add(record.src_ip, record.l4, record.octets);
                iface.in_packets.add(record.src_ip, record.l4, record.packets);
                if deep {
                    fold_deep_sample(
                        iface,
                        Side::In,
                        record,
                        &src_label,
                        &dst_label,
                        &src_service,
                        &dst_service,
                        self.config.enrichment_enabled,
                        self.asn.as_deref(),
                        self.geo.as_deref(),
                    );
                }
                device.top_in_ifindex_bytes.update_by(idx, record.octets);
                device.top_in_ifindex_packets.update_by(idx, record.packets);
            }

            if let Some(idx) = record.if_out_index {
                let iface = device.interfaces.entry(idx).or_insert_with(|| FlowInterfaceBucket::new(&sketches));
                iface.out_bytes.add(record.src_ip, record.l4, record.octets);
                iface.out_packets.add(record.src_ip, record.l4, record.packets);
                if deep {
                    fold_deep_sample(
                        iface,
                        Side::Out,
                        record,
                        &src_label,
                        &dst_label,
                        &src_service,
                        &dst_service,
                        self.config.enrichment_enabled,
                        self.asn.as_deref(),
                        self.geo.as_deref(),
                    );
                }
                device.top_out_ifindex_bytes.update_by(idx, record.octets);
                device.top_out_ifindex_packets.update_by(idx, record.packets);
            }
        }
    }

    pub fn rotate(&mut self) {
        self.period.rotate();
    }
}

#[allow(clippy::too_many_arguments)]
fn fold_deep_sample(
    iface: &mut FlowInterfaceBucket,
    side: Side,
    record: &FlowData,
    src_label: &str,
    dst_label: &str,
    src_service: &str,
    dst_service: &str,
    enrichment_enabled: bool,
    asn: Option<&dyn AsnResolver>,
    geo: Option<&dyn GeoResolver>,
) {
    let src_ip_port = format!("{src_label}:{src_service}");
    let dst_ip_port = format!("{dst_label}:{dst_service}");
    let conversation = canonical_conversation(&src_ip_port, &dst_ip_port);

    iface.src_ip_cardinality.update_bytes(src_label.as_bytes());
    iface.dst_ip_cardinality.update_bytes(dst_label.as_bytes());
    iface.conversations_cardinality.update_bytes(conversation.as_bytes());

    let (bytes_top, packets_top) = match side {
        Side::In => (&mut iface.in_bytes_top, &mut iface.in_packets_top),
        Side::Out => (&mut iface.out_bytes_top, &mut iface.out_packets_top),
    };

    for (topn, weight) in [(&mut *bytes_top, record.octets), (&mut *packets_top, record.packets)] {
        topn.top_src_ip.update_by(src_label.to_string(), weight);
        topn.top_dst_ip.update_by(dst_label.to_string(), weight);
        topn.top_src_port.update_by(record.src_port, weight);
        topn.top_dst_port.update_by(record.dst_port, weight);
        topn.top_src_ip_port.update_by(src_ip_port.clone(), weight);
        topn.top_dst_ip_port.update_by(dst_ip_port.clone(), weight);
        topn.top_dscp.update_by(dscp(record.tos), weight);
        topn.top_ecn.update_by(ecn(record.tos), weight);
        topn.top_conversations.update_by(conversation.clone(), weight);

        if enrichment_enabled {
            if let Some(resolver) = geo {
                if let Some(label) = resolver.lookup_city(record.src_ip) {
                    topn.top_geo_city.update_by(label.city, weight);
                }
            }
            if let Some(resolver) = asn {
                topn.top_asn.update_by(resolver.lookup_asn(record.src_ip), weight);
            }
        }
    }
}
