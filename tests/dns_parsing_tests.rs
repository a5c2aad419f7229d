//! End-to-end coverage for the DNS wire parser and TCP framing (spec.md §8
//! properties 1, 2, 3, 5).

use wireloom::dns::{encode_name, DnsLayer, QClass, QType, Section, TcpSessionBuffer};

fn query_packet(name: &str) -> Vec<u8> {
    let mut buf = vec![
        0x12, 0x34, // id
        0x01, 0x00, // flags: RD set
        0x00, 0x01, // qdcount
        0x00, 0x00, // ancount
        0x00, 0x00, // nscount
        0x00, 0x00, // arcount
    ];
    buf.extend_from_slice(&encode_name(name).unwrap());
    buf.extend_from_slice(&1u16.to_be_bytes()); // QTYPE A
    buf.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN
    buf
}

#[test]
fn oversized_section_counts_fail_parse_without_partial_state() {
    let mut buf = query_packet("example.com");
    buf[4] = 0xFF; // qdcount far over MAX_RESOURCES
    buf[5] = 0xFF;
    let mut layer = DnsLayer::new(buf).unwrap();
    assert!(!layer.parse_resources(false));
    assert!(layer.is_parse_failed());
    assert!(layer.first(Section::Question).is_none());
}

#[test]
fn resource_crossing_buffer_end_fails_parse() {
    let mut buf = query_packet("example.com");
    // Declare an answer that never arrives: ancount=1 with no bytes for it.
    buf[6] = 0x00;
    buf[7] = 0x01;
    let mut layer = DnsLayer::new(buf).unwrap();
    assert!(!layer.parse_resources(false));
    assert!(layer.is_parse_failed());
}

#[test]
fn add_resource_keeps_sections_ordered_and_counts_consistent() {
    let mut layer = DnsLayer::new(query_packet("example.com")).unwrap();
    assert!(layer.parse_resources(false));

    layer
        .add_resource(Section::Additional, "example.com", QType::Opt, QClass::In, 0, vec![])
        .unwrap();
    layer
        .add_resource(Section::Answer, "example.com", QType::A, QClass::In, 300, vec![93, 184, 216, 34])
        .unwrap();
    layer
        .add_resource(Section::Authority, "example.com", QType::Ns, QClass::In, 300, b"ns1.example.com".to_vec())
        .unwrap();

    assert_eq!(layer.header().qdcount, 1);
    assert_eq!(layer.header().ancount, 1);
    assert_eq!(layer.header().nscount, 1);
    assert_eq!(layer.header().arcount, 1);

    assert!(layer.parse_resources(true));
    let question = layer.first(Section::Question).unwrap();
    let answer = layer.first(Section::Answer).unwrap();
    let authority = layer.first(Section::Authority).unwrap();
    let additional = layer.first(Section::Additional).unwrap();
    assert!(question.wire_offset < answer.wire_offset);
    assert!(answer.wire_offset < authority.wire_offset);
    assert!(authority.wire_offset < additional.wire_offset);
}

#[test]
fn add_then_remove_round_trips_to_the_original_bytes() {
    let original = query_packet("example.com");
    let mut layer = DnsLayer::new(original.clone()).unwrap();
    assert!(layer.parse_resources(false));

    let handle = layer
        .add_resource(Section::Answer, "example.com", QType::A, QClass::In, 300, vec![93, 184, 216, 34])
        .unwrap();
    assert_ne!(layer.wire(), original.as_slice());

    layer.remove_resource(handle).unwrap();
    assert_eq!(layer.wire(), original.as_slice());
    assert_eq!(layer.header().ancount, 0);
}

#[test]
fn tcp_stream_emits_exactly_the_framed_messages() {
    let mut buf = TcpSessionBuffer::new();
    let msg1 = vec![0xAB; 20];
    let msg2 = vec![0xCD; 30];

    let mut wire = (msg1.len() as u16).to_be_bytes().to_vec();
    wire.extend(&msg1);
    wire.extend((msg2.len() as u16).to_be_bytes());
    wire.extend(&msg2);

    // Split the combined wire data across three arbitrary chunk boundaries.
    let (a, rest) = wire.split_at(7);
    let (b, c) = rest.split_at(25);

    let mut out = buf.push(a);
    out.extend(buf.push(b));
    out.extend(buf.push(c));

    assert_eq!(out, vec![msg1, msg2]);
}

#[test]
fn length_prefix_below_minimum_desyncs_without_emitting() {
    let mut buf = TcpSessionBuffer::new();
    let mut wire = 16u16.to_be_bytes().to_vec();
    wire.extend(vec![0u8; 16]);
    let out = buf.push(&wire);
    assert!(out.is_empty());
    assert!(buf.is_desynced());
}

#[test]
fn length_prefix_above_maximum_desyncs_without_emitting() {
    let mut buf = TcpSessionBuffer::new();
    let mut wire = 513u16.to_be_bytes().to_vec();
    wire.extend(vec![0u8; 513]);
    let out = buf.push(&wire);
    assert!(out.is_empty());
    assert!(buf.is_desynced());
}
