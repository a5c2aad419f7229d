//! DNS metrics handler: counts and sketches over parsed DNS wire traffic,
//! matching queries to replies through a `Transactions` table (spec.md
//! §4.2, §4.3). Field names and schema-key paths follow the original
//! `DnsMetricsBucket`/`DnsMetricsManager` (`original_source/src/handlers/
//! dns/DnsStreamHandler.h`) one-for-one.

use crate::bucket::Mergeable;
use crate::common::{Direction, L3, L4};
use crate::config::DnsHandlerConfig;
use crate::dns::{DnsLayer, FlowKey, ResponseCode, Section, Transactions};
use crate::metric::{Counter, LabelMap};
use crate::period_manager::PeriodManager;
use crate::sketches::{Cardinality, Quantile, Rate, TopN};

pub struct DnsMetricsBucket {
    pub xacts_total: Counter,
    pub xacts_in: Counter,
    pub xacts_out: Counter,
    pub xacts_timed_out: Counter,
    pub queries: Counter,
    pub replies: Counter,
    pub udp: Counter,
    pub tcp: Counter,
    pub ipv4: Counter,
    pub ipv6: Counter,
    pub nx: Counter,
    pub refused: Counter,
    pub srvfail: Counter,
    pub noerror: Counter,
    pub filtered: Counter,

    pub rate_total: Rate,
    pub xact_from_time_us: Quantile,
    pub xact_to_time_us: Quantile,
    pub qname_cardinality: Cardinality,
    pub top_qname2: TopN<String>,
    pub top_qname3: TopN<String>,
    pub top_nx: TopN<String>,
    pub top_refused: TopN<String>,
    pub top_srvfail: TopN<String>,
    pub top_udp_port: TopN<u16>,
    pub top_qtype: TopN<u16>,
    pub top_rcode: TopN<u16>,
    pub top_org_id: TopN<u64>,
    pub slow_xact_in: TopN<String>,
    pub slow_xact_out: TopN<String>,
}

impl DnsMetricsBucket {
    pub fn new(sketches: &crate::config::SketchConfig) -> Self {
        let n = sketches.topn_count;
        let pct = sketches.topn_percentile_threshold;
        Self {
            xacts_total: Counter::new("dns", &["xact", "counts", "total"], "Total DNS transactions (query/reply pairs)"),
            xacts_in: Counter::new("dns", &["xact", "in", "total"], "Total ingress DNS transactions (host is server)"),
            xacts_out: Counter::new("dns", &["xact", "out", "total"], "Total egress DNS transactions (host is client)"),
            xacts_timed_out: Counter::new("dns", &["xact", "counts", "timed_out"], "Total DNS transactions that timed out"),
            queries: Counter::new("dns", &["wire_packets", "queries"], "Total DNS wire packets flagged as query"),
            replies: Counter::new("dns", &["wire_packets", "replies"], "Total DNS wire packets flagged as reply"),
            udp: Counter::new("dns", &["wire_packets", "udp"], "Total DNS wire packets received over UDP"),
            tcp: Counter::new("dns", &["wire_packets", "tcp"], "Total DNS wire packets received over TCP"),
            ipv4: Counter::new("dns", &["wire_packets", "ipv4"], "Total DNS wire packets received over IPv4"),
            ipv6: Counter::new("dns", &["wire_packets", "ipv6"], "Total DNS wire packets received over IPv6"),
            nx: Counter::new("dns", &["wire_packets", "nxdomain"], "Total DNS replies with rcode NXDOMAIN"),
            refused: Counter::new("dns", &["wire_packets", "refused"], "Total DNS replies with rcode REFUSED"),
            srvfail: Counter::new("dns", &["wire_packets", "srvfail"], "Total DNS replies with rcode SRVFAIL"),
            noerror: Counter::new("dns", &["wire_packets", "noerror"], "Total DNS replies with rcode NOERROR"),
            filtered: Counter::new("dns", &["wire_packets", "filtered"], "Total DNS wire packets that did not match the configured filter"),

            rate_total: Rate::new("dns", &["rates", "total"], "Rate of all DNS wire packets per second"),
            xact_from_time_us: Quantile::new("dns", &["xact", "out", "quantiles_us"], "Quantiles of transaction timing when host is client, in microseconds"),
            xact_to_time_us: Quantile::new("dns", &["xact", "in", "quantiles_us"], "Quantiles of transaction timing when host is server, in microseconds"),
            qname_cardinality: Cardinality::new("dns", &["cardinality", "qname"], "Cardinality of unique QNAMEs", sketches.cardinality_precision),
            top_qname2: TopN::new("dns", &["top_qname2"], "Top QNAMEs aggregated at a depth of two labels", n, pct),
            top_qname3: TopN::new("dns", &["top_qname3"], "Top QNAMEs aggregated at a depth of three labels", n, pct),
            top_nx: TopN::new("dns", &["top_nxdomain"], "Top QNAMEs with result code NXDOMAIN", n, pct),
            top_refused: TopN::new("dns", &["top_refused"], "Top QNAMEs with result code REFUSED", n, pct),
            top_srvfail: TopN::new("dns", &["top_srvfail"], "Top QNAMEs with result code SRVFAIL", n, pct),
            top_udp_port: TopN::new("dns", &["top_udp_ports"], "Top UDP source port on the query side of a transaction", n, pct),
            top_qtype: TopN::new("dns", &["top_qtype"], "Top query types", n, pct),
            top_rcode: TopN::new("dns", &["top_rcode"], "Top result codes", n, pct),
            top_org_id: TopN::new("dns", &["top_org_ids"], "Top organization IDs", n, pct),
            slow_xact_in: TopN::new("dns", &["xact", "in", "top_slow"], "Top QNAMEs where host is server and transaction speed is slower than p90", n, pct),
            slow_xact_out: TopN::new("dns", &["xact", "out", "top_slow"], "Top QNAMEs where host is client and transaction speed is slower than p90", n, pct),
        }
    }

    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        self.xacts_total.to_json(&mut out);
        self.xacts_in.to_json(&mut out);
        self.xacts_out.to_json(&mut out);
        self.xacts_timed_out.to_json(&mut out);
        self.queries.to_json(&mut out);
        self.replies.to_json(&mut out);
        self.udp.to_json(&mut out);
        self.tcp.to_json(&mut out);
        self.ipv4.to_json(&mut out);
        self.ipv6.to_json(&mut out);
        self.nx.to_json(&mut out);
        self.refused.to_json(&mut out);
        self.srvfail.to_json(&mut out);
        self.noerror.to_json(&mut out);
        self.filtered.to_json(&mut out);
        self.rate_total.to_json(&mut out);
        self.xact_from_time_us.to_json(&mut out);
        self.xact_to_time_us.to_json(&mut out);
        self.qname_cardinality.to_json(&mut out);
        self.top_qname2.to_json(&mut out);
        self.top_qname3.to_json(&mut out);
        self.top_nx.to_json(&mut out);
        self.top_refused.to_json(&mut out);
        self.top_srvfail.to_json(&mut out);
        self.top_udp_port.to_json(&mut out);
        self.top_qtype.to_json(&mut out);
        self.top_rcode.to_json(&mut out);
        self.top_org_id.to_json(&mut out);
        self.slow_xact_in.to_json(&mut out);
        self.slow_xact_out.to_json(&mut out);
        out
    }

    pub fn to_prometheus(&self, labels: &LabelMap) -> String {
        let mut out = String::new();
        self.xacts_total.to_prometheus(&mut out, labels);
        self.xacts_in.to_prometheus(&mut out, labels);
        self.xacts_out.to_prometheus(&mut out, labels);
        self.xacts_timed_out.to_prometheus(&mut out, labels);
        self.queries.to_prometheus(&mut out, labels);
        self.replies.to_prometheus(&mut out, labels);
        self.udp.to_prometheus(&mut out, labels);
        self.tcp.to_prometheus(&mut out, labels);
        self.ipv4.to_prometheus(&mut out, labels);
        self.ipv6.to_prometheus(&mut out, labels);
        self.nx.to_prometheus(&mut out, labels);
        self.refused.to_prometheus(&mut out, labels);
        self.srvfail.to_prometheus(&mut out, labels);
        self.noerror.to_prometheus(&mut out, labels);
        self.filtered.to_prometheus(&mut out, labels);
        self.rate_total.to_prometheus(&mut out, labels);
        self.xact_from_time_us.to_prometheus(&mut out, labels);
        self.xact_to_time_us.to_prometheus(&mut out, labels);
        self.qname_cardinality.to_prometheus(&mut out, labels);
        self.top_qname2.to_prometheus(&mut out, labels);
        self.top_qname3.to_prometheus(&mut out, labels);
        self.top_nx.to_prometheus(&mut out, labels);
        self.top_refused.to_prometheus(&mut out, labels);
        self.top_srvfail.to_prometheus(&mut out, labels);
        self.top_udp_port.to_prometheus(&mut out, labels);
        self.top_qtype.to_prometheus(&mut out, labels);
        self.top_rcode.to_prometheus(&mut out, labels);
        self.top_org_id.to_prometheus(&mut out, labels);
        self.slow_xact_in.to_prometheus(&mut out, labels);
        self.slow_xact_out.to_prometheus(&mut out, labels);
        out
    }
}

impl Default for DnsMetricsBucket {
    fn default() -> Self {
        Self::new(&crate::config::SketchConfig::default())
    }
}

impl Mergeable for DnsMetricsBucket {
    fn merge(&mut self, other: &Self) {
        self.xacts_total.merge(&other.xacts_total);
        self.xacts_in.merge(&other.xacts_in);
        self.xacts_out.merge(&other.xacts_out);
        self.xacts_timed_out.merge(&other.xacts_timed_out);
        self.queries.merge(&other.queries);
        self.replies.merge(&other.replies);
        self.udp.merge(&other.udp);
        self.tcp.merge(&other.tcp);
        self.ipv4.merge(&other.ipv4);
        self.ipv6.merge(&other.ipv6);
        self.nx.merge(&other.nx);
        self.refused.merge(&other.refused);
        self.srvfail.merge(&other.srvfail);
        self.noerror.merge(&other.noerror);
        self.filtered.merge(&other.filtered);
        self.rate_total.merge(&other.rate_total);
        self.xact_from_time_us.merge(&other.xact_from_time_us);
        self.xact_to_time_us.merge(&other.xact_to_time_us);
        self.qname_cardinality.merge(&other.qname_cardinality);
        self.top_qname2.merge(&other.top_qname2);
        self.top_qname3.merge(&other.top_qname3);
        self.top_nx.merge(&other.top_nx);
        self.top_refused.merge(&other.top_refused);
        self.top_srvfail.merge(&other.top_srvfail);
        self.top_udp_port.merge(&other.top_udp_port);
        self.top_qtype.merge(&other.top_qtype);
        self.top_rcode.merge(&other.top_rcode);
        self.top_org_id.merge(&other.top_org_id);
        self.slow_xact_in.merge(&other.slow_xact_in);
        self.slow_xact_out.merge(&other.slow_xact_out);
    }
}

impl Clone for DnsMetricsBucket {
    fn clone(&self) -> Self {
        Self {
            xacts_total: self.xacts_total.clone(),
            xacts_in: self.xacts_in.clone(),
            xacts_out: self.xacts_out.clone(),
            xacts_timed_out: self.xacts_timed_out.clone(),
            queries: self.queries.clone(),
            replies: self.replies.clone(),
            udp: self.udp.clone(),
            tcp: self.tcp.clone(),
            ipv4: self.ipv4.clone(),
            ipv6: self.ipv6.clone(),
            nx: self.nx.clone(),
            refused: self.refused.clone(),
            srvfail: self.srvfail.clone(),
            noerror: self.noerror.clone(),
            filtered: self.filtered.clone(),
            rate_total: self.rate_total.clone(),
            xact_from_time_us: self.xact_from_time_us.clone(),
            xact_to_time_us: self.xact_to_time_us.clone(),
            qname_cardinality: self.qname_cardinality.clone(),
            top_qname2: self.top_qname2.clone(),
            top_qname3: self.top_qname3.clone(),
            top_nx: self.top_nx.clone(),
            top_refused: self.top_refused.clone(),
            top_srvfail: self.top_srvfail.clone(),
            top_udp_port: self.top_udp_port.clone(),
            top_qtype: self.top_qtype.clone(),
            top_rcode: self.top_rcode.clone(),
            top_org_id: self.top_org_id.clone(),
            slow_xact_in: self.slow_xact_in.clone(),
            slow_xact_out: self.slow_xact_out.clone(),
        }
    }
}

/// Rightmost `depth` labels of `name`, joined by `.` (spec.md §4.2
/// "aggregated at a depth of two/three labels").
fn qname_depth(name: &str, depth: usize) -> String {
    let labels: Vec<&str> = name.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= depth {
        name.to_string()
    } else {
        labels[labels.len() - depth..].join(".")
    }
}

pub struct DnsHandler {
    pub config: DnsHandlerConfig,
    pub period: PeriodManager<DnsMetricsBucket>,
    transactions: Transactions,
    to90th: f64,
    from90th: f64,
}

impl DnsHandler {
    pub fn new(config: DnsHandlerConfig) -> Self {
        let template = DnsMetricsBucket::new(&config.sketches);
        let period = PeriodManager::new(config.window.clone(), template);
        let transactions = Transactions::new(config.max_open_transactions);
        Self {
            config,
            period,
            transactions,
            to90th: 0.0,
            from90th: 0.0,
        }
    }

    pub fn num_open_transactions(&self) -> usize {
        self.transactions.open_count()
    }

    pub fn process_filtered(&self) {
        self.period.live().write().metrics.filtered.inc();
    }

    /// Folds one parsed DNS message into the live bucket and, on a reply,
    /// matches it back to its query for transaction timing.
    pub fn process_dns_layer(
        &mut self,
        layer: &DnsLayer,
        direction: Direction,
        l3: L3,
        l4: L4,
        flow: FlowKey,
        port: u16,
        org_id: Option<u64>,
    ) {
        let header = *layer.header();

        if header.qr {
            if let Some(only) = self.config.only_rcode {
                if header.rcode() != only {
                    self.process_filtered();
                    return;
                }
            }
        }

        let deep = self.period.should_deep_sample();
        let qname = layer.first(Section::Question).map(|r| r.name.clone());

        {
            let bucket = self.period.live();
            let mut b = bucket.write();
            b.meta.record_event(deep);
            b.metrics.rate_total.update();

            match l4 {
                L4::Udp => b.metrics.udp.inc(),
                L4::Tcp => b.metrics.tcp.inc(),
                L4::Other(_) => {}
            }
            match l3 {
                L3::Ipv4 => b.metrics.ipv4.inc(),
                L3::Ipv6 => b.metrics.ipv6.inc(),
            }

            if header.qr {
                b.metrics.replies.inc();
                match header.rcode() {
                    ResponseCode::NxDomain => b.metrics.nx.inc(),
                    ResponseCode::Refused => b.metrics.refused.inc(),
                    ResponseCode::ServFail => b.metrics.srvfail.inc(),
                    ResponseCode::NoError => b.metrics.noerror.inc(),
                    _ => {}
                }
            } else {
                b.metrics.queries.inc();
            }

            if deep {
                if let Some(name) = &qname {
                    b.metrics.qname_cardinality.update_bytes(name.as_bytes());
                    b.metrics.top_qname2.update(qname_depth(name, 2));
                    b.metrics.top_qname3.update(qname_depth(name, 3));
                }
                b.metrics.top_rcode.update(header.rcode as u16);
                if let Some(id) = org_id {
                    b.metrics.top_org_id.update(id);
                }

                if !header.qr {
                    if let Some(q) = layer.first(Section::Question) {
                        b.metrics.top_qtype.update(q.rtype.to_u16());
                    }
                    if matches!(l4, L4::Udp) {
                        b.metrics.top_udp_port.update(port);
                    }
                } else if let Some(name) = &qname {
                    match header.rcode() {
                        ResponseCode::NxDomain => b.metrics.top_nx.update(name.clone()),
                        ResponseCode::Refused => b.metrics.top_refused.update(name.clone()),
                        ResponseCode::ServFail => b.metrics.top_srvfail.update(name.clone()),
                        _ => {}
                    }
                }
            }
        }

        if !header.qr {
            self.transactions.start_transaction(flow, header.id, direction);
            return;
        }

        let Some(elapsed) = self.transactions.maybe_end_transaction(flow, header.id) else {
            return;
        };
        let micros = elapsed.as_micros().min(u128::from(u64::MAX)) as u64;

        let bucket = self.period.live();
        let mut b = bucket.write();
        b.metrics.xacts_total.inc();
        match direction {
            Direction::FromHost => {
                b.metrics.xacts_out.inc();
                b.metrics.xact_from_time_us.update(micros);
                if self.from90th > 0.0 && micros as f64 > self.from90th {
                    if let Some(name) = &qname {
                        b.metrics.slow_xact_out.update(name.clone());
                    }
                }
            }
            Direction::ToHost => {
                b.metrics.xacts_in.inc();
                b.metrics.xact_to_time_us.update(micros);
                if self.to90th > 0.0 && micros as f64 > self.to90th {
                    if let Some(name) = &qname {
                        b.metrics.slow_xact_in.update(name.clone());
                    }
                }
            }
        }
    }

    /// Purges timed-out transactions and recomputes the slow-transaction
    /// thresholds from the bucket that just sealed (original
    /// `DnsMetricsManager::on_period_shift`).
    pub fn rotate(&mut self) {
        self.period.rotate();
        let timed_out = self.transactions.purge_old(self.config.transaction_timeout) as u64;
        if timed_out > 0 {
            self.period.live().write().metrics.xacts_timed_out.add(timed_out);
        }
        if let Some(retired) = self.period.bucket(1) {
            let retired = retired.read();
            if retired.metrics.xact_from_time_us.get_n() > 0 {
                self.from90th = retired.metrics.xact_from_time_us.get_quantile(0.90);
            }
            if retired.metrics.xact_to_time_us.get_n() > 0 {
                self.to90th = retired.metrics.xact_to_time_us.get_quantile(0.90);
            }
        }
    }
}
