//! Bucket/period manager coverage: rotation, merge associativity, and the
//! DNS query/reply and `only_rcode` filter end-to-end scenarios (spec.md §8).

use std::time::Duration;

use wireloom::common::{Direction, L3, L4};
use wireloom::config::{DnsHandlerConfig, WindowConfig};
use wireloom::dns::{encode_name, DnsLayer, ResponseCode, Section};
use wireloom::handlers::DnsHandler;

fn query_packet(name: &str, id: u16) -> Vec<u8> {
    let mut buf = vec![
        (id >> 8) as u8,
        (id & 0xff) as u8,
        0x01, 0x00, // flags: RD set
        0x00, 0x01, // qdcount
        0x00, 0x00,
        0x00, 0x00,
        0x00, 0x00,
    ];
    buf.extend_from_slice(&encode_name(name).unwrap());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf
}

fn reply_packet(name: &str, id: u16, rcode: ResponseCode) -> Vec<u8> {
    let mut buf = query_packet(name, id);
    buf[2] = 0x81; // QR=1, RD=1
    buf[3] = 0x80 | rcode.to_u8(); // RA=1, rcode in low nibble
    buf
}

fn window() -> WindowConfig {
    WindowConfig {
        window_count: 4,
        period: Duration::from_secs(60),
        deep_sample_rate: 1.0,
        ..WindowConfig::default()
    }
}

#[test]
fn udp_query_and_reply_round_trip_a_transaction() {
    let config = DnsHandlerConfig {
        window: window(),
        ..DnsHandlerConfig::default()
    };
    let mut handler = DnsHandler::new(config);

    let query = DnsLayer::new(query_packet("example.com", 0x1234)).unwrap();
    handler.process_dns_layer(&query, Direction::FromHost, L3::Ipv4, L4::Udp, 1, 53, None);

    let reply = DnsLayer::new(reply_packet("example.com", 0x1234, ResponseCode::NoError)).unwrap();
    handler.process_dns_layer(&reply, Direction::FromHost, L3::Ipv4, L4::Udp, 1, 53, None);

    let bucket = handler.period.live();
    let b = bucket.read();
    assert_eq!(b.metrics.queries.get(), 1);
    assert_eq!(b.metrics.replies.get(), 1);
    assert_eq!(b.metrics.noerror.get(), 1);
    assert_eq!(b.metrics.xacts_total.get(), 1);
    assert_eq!(b.metrics.xacts_out.get(), 1);
    assert_eq!(b.metrics.xact_from_time_us.get_n(), 1);
    // Both the query and the reply message pass through the protocol
    // counters independently.
    assert_eq!(b.metrics.udp.get(), 2);
    assert_eq!(b.metrics.ipv4.get(), 2);
    assert_eq!(handler.num_open_transactions(), 0);
}

#[test]
fn only_rcode_filter_drops_non_matching_replies() {
    let config = DnsHandlerConfig {
        window: window(),
        only_rcode: Some(ResponseCode::NxDomain),
        ..DnsHandlerConfig::default()
    };
    let mut handler = DnsHandler::new(config);

    let reply = DnsLayer::new(reply_packet("example.com", 0x1234, ResponseCode::NoError)).unwrap();
    handler.process_dns_layer(&reply, Direction::ToHost, L3::Ipv4, L4::Udp, 1, 53, None);

    let bucket = handler.period.live();
    let b = bucket.read();
    assert_eq!(b.metrics.filtered.get(), 1);
    assert_eq!(b.metrics.replies.get(), 0);
    assert_eq!(b.metrics.noerror.get(), 0);
    assert_eq!(b.metrics.udp.get(), 0);
}

#[test]
fn rotation_seals_the_live_bucket_and_starts_a_fresh_one() {
    let mut handler = DnsHandler::new(DnsHandlerConfig {
        window: window(),
        ..DnsHandlerConfig::default()
    });

    let query = DnsLayer::new(query_packet("example.com", 1)).unwrap();
    handler.process_dns_layer(&query, Direction::FromHost, L3::Ipv4, L4::Udp, 1, 53, None);
    handler.rotate();

    assert_eq!(handler.period.live().read().metrics.queries.get(), 0);
    assert_eq!(handler.period.bucket(1).unwrap().read().metrics.queries.get(), 1);
}

#[test]
fn merge_across_three_periods_is_associative() {
    let mut handler = DnsHandler::new(DnsHandlerConfig {
        window: window(),
        ..DnsHandlerConfig::default()
    });

    for id in 0..3u16 {
        let query = DnsLayer::new(query_packet("example.com", id)).unwrap();
        handler.process_dns_layer(&query, Direction::FromHost, L3::Ipv4, L4::Udp, 1, 53, None);
        handler.rotate();
    }
    let query = DnsLayer::new(query_packet("example.com", 3)).unwrap();
    handler.process_dns_layer(&query, Direction::FromHost, L3::Ipv4, L4::Udp, 1, 53, None);

    let left = handler.period.merge_range(0, 3).unwrap();
    assert_eq!(left.metrics.queries.get(), 4);

    // Merging [0,1] then folding in [2,3] gives the same total as one shot.
    let mut partial = handler.period.bucket(0).unwrap().read().clone();
    partial.merge_from(&handler.period.bucket(1).unwrap().read());
    let mut rest = handler.period.bucket(2).unwrap().read().clone();
    rest.merge_from(&handler.period.bucket(3).unwrap().read());
    partial.merge_from(&rest);
    assert_eq!(partial.metrics.queries.get(), left.metrics.queries.get());
}
