use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wireloom::dns::{decode_name, encode_name, DnsLayer, Section};

fn query_packet() -> Vec<u8> {
    let mut buf = vec![
        0x12, 0x34, // id
        0x01, 0x00, // flags: RD set
        0x00, 0x01, // qdcount
        0x00, 0x00, // ancount
        0x00, 0x00, // nscount
        0x00, 0x00, // arcount
    ];
    buf.extend_from_slice(&encode_name("www.example.com").unwrap());
    buf.extend_from_slice(&1u16.to_be_bytes()); // QTYPE A
    buf.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN
    buf
}

fn bench_header_decode(c: &mut Criterion) {
    let packet = query_packet();
    c.bench_function("decode dns header", |b| {
        b.iter(|| {
            let layer = DnsLayer::new(black_box(packet.clone())).unwrap();
            black_box(layer.header().id);
        });
    });
}

fn bench_parse_resources(c: &mut Criterion) {
    let packet = query_packet();
    c.bench_function("parse dns question section", |b| {
        b.iter(|| {
            let mut layer = DnsLayer::new(black_box(packet.clone())).unwrap();
            layer.parse_resources(false);
            black_box(layer.first(Section::Question));
        });
    });
}

fn bench_decode_name(c: &mut Criterion) {
    let packet = query_packet();
    c.bench_function("decode dns name", |b| {
        b.iter(|| {
            let (name, _) = decode_name(black_box(&packet), 12).unwrap();
            black_box(name);
        });
    });
}

criterion_group!(benches, bench_header_decode, bench_parse_resources, bench_decode_name);
criterion_main!(benches);
