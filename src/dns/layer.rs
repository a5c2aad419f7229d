//! Parses a raw UDP/TCP-framed DNS message into a live, editable resource
//! arena over the original wire buffer (spec.md §4.1; original
//! `visor_dns/DnsLayer.cpp::parseResources` for the section-count cap and
//! out-of-bounds handling this follows).

use bytes::Bytes;

use super::error::ParseError;
use super::header::{Header, HEADER_LEN};
use super::name::{decode_name, encode_name};
use super::resource::{ResourceArena, ResourceHandle, ResourceRecord, Section};
use super::types::{QClass, QType};

/// Anti-DoS cap on combined qd+an+ns+ar counts (spec.md §4.1).
pub const MAX_RESOURCES: usize = 100;

/// Default set of ports treated as carrying DNS traffic in addition to 53.
const EXTRA_DNS_PORTS: [u16; 1] = [5353];

pub fn is_dns_port(port: u16) -> bool {
    port == 53 || EXTRA_DNS_PORTS.contains(&port)
}

#[derive(Debug)]
pub struct DnsLayer {
    buffer: Vec<u8>,
    header: Header,
    arena: ResourceArena,
    parsed: bool,
    parse_failed: bool,
}

impl DnsLayer {
    /// Decodes only the fixed 12-byte header; `parse_resources` is opt-in
    /// and lazy so a caller that only needs the rcode/xid never pays for
    /// walking resource sections.
    pub fn new(buffer: Vec<u8>) -> Result<Self, ParseError> {
        let header = Header::decode(&buffer)?;
        Ok(Self {
            buffer,
            header,
            arena: ResourceArena::default(),
            parsed: false,
            parse_failed: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn wire(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_parse_failed(&self) -> bool {
        self.parse_failed
    }

    /// Walks question/answer/authority/additional resources into the arena.
    /// A failed parse is sticky: later calls return `false` without
    /// re-walking the buffer, unless `force` is set. A successful parse is
    /// always served from cache.
    pub fn parse_resources(&mut self, force: bool) -> bool {
        if self.parsed {
            if !self.parse_failed {
                return true;
            }
            if !force {
                return false;
            }
        }

        self.parsed = true;
        self.arena.clear();
        match self.try_parse_resources() {
            Ok(()) => {
                self.parse_failed = false;
                true
            }
            Err(_) => {
                // No partially linked resources survive a failed parse.
                self.arena.clear();
                self.parse_failed = true;
                false
            }
        }
    }

    fn try_parse_resources(&mut self) -> Result<(), ParseError> {
        if self.header.total_resources() > MAX_RESOURCES {
            return Err(ParseError::TooManyResources);
        }

        let mut offset = HEADER_LEN;
        let sections = [
            (Section::Question, self.header.qdcount),
            (Section::Answer, self.header.ancount),
            (Section::Authority, self.header.nscount),
            (Section::Additional, self.header.arcount),
        ];
        for (section, count) in sections {
            for _ in 0..count {
                let (record, consumed) = self.parse_one(section, offset)?;
                offset += consumed;
                self.arena.push(record);
            }
        }
        Ok(())
    }

    fn parse_one(&self, section: Section, offset: usize) -> Result<(ResourceRecord, usize), ParseError> {
        let (name, name_len) = decode_name(&self.buffer, offset)?;
        let mut pos = offset + name_len;

        let rtype = QType::from_u16(self.read_u16(pos)?);
        pos += 2;
        let rclass = QClass::from_u16(self.read_u16(pos)?);
        pos += 2;

        if section == Section::Question {
            let wire_size = pos - offset;
            return Ok((
                ResourceRecord {
                    section,
                    name,
                    rtype,
                    rclass,
                    ttl: 0,
                    rdata: Bytes::new(),
                    wire_offset: offset,
                    wire_size,
                },
                wire_size,
            ));
        }

        let ttl = self.read_u32(pos)?;
        pos += 4;
        let rdlength = self.read_u16(pos)? as usize;
        pos += 2;
        if pos + rdlength > self.buffer.len() {
            return Err(ParseError::OutOfBounds);
        }
        let rdata = Bytes::copy_from_slice(&self.buffer[pos..pos + rdlength]);
        pos += rdlength;

        let wire_size = pos - offset;
        Ok((
            ResourceRecord {
                section,
                name,
                rtype,
                rclass,
                ttl,
                rdata,
                wire_offset: offset,
                wire_size,
            },
            wire_size,
        ))
    }

    fn read_u16(&self, pos: usize) -> Result<u16, ParseError> {
        if pos + 2 > self.buffer.len() {
            return Err(ParseError::OutOfBounds);
        }
        Ok(u16::from_be_bytes([self.buffer[pos], self.buffer[pos + 1]]))
    }

    fn read_u32(&self, pos: usize) -> Result<u32, ParseError> {
        if pos + 4 > self.buffer.len() {
            return Err(ParseError::OutOfBounds);
        }
        Ok(u32::from_be_bytes([
            self.buffer[pos],
            self.buffer[pos + 1],
            self.buffer[pos + 2],
            self.buffer[pos + 3],
        ]))
    }

    pub fn first(&self, section: Section) -> Option<&ResourceRecord> {
        self.arena.first(section).map(|(_, r)| r)
    }

    /// Looks up a resource by name within `section`. `exact` requires an
    /// exact match; otherwise a case-sensitive substring match is used
    /// (preserved as-is from the original implementation — spec.md §9 is
    /// explicit that this quirk should not be "fixed").
    pub fn get_by_name(&self, section: Section, name: &str, exact: bool) -> Option<&ResourceRecord> {
        self.arena.section(section).find_map(|(_, r)| {
            let matched = if exact { r.name == name } else { r.name.contains(name) };
            matched.then_some(r)
        })
    }

    fn insertion_point(&self, section: Section) -> usize {
        if let Some((_, last)) = self.arena.section(section).last() {
            return last.wire_offset + last.wire_size;
        }
        for candidate in Section::ALL.into_iter().filter(|&s| s > section) {
            if let Some((_, rec)) = self.arena.first(candidate) {
                return rec.wire_offset;
            }
        }
        self.buffer.len()
    }

    /// Splices a freshly encoded resource into the wire buffer and the
    /// arena, bumping the matching header count. Returns a handle valid
    /// until the matching `remove_resource`.
    pub fn add_resource(
        &mut self,
        section: Section,
        name: &str,
        rtype: QType,
        rclass: QClass,
        ttl: u32,
        rdata: impl Into<Bytes>,
    ) -> Result<ResourceHandle, ParseError> {
        let rdata = rdata.into();
        let mut wire = encode_name(name)?;
        wire.extend_from_slice(&rtype.to_u16().to_be_bytes());
        wire.extend_from_slice(&rclass.to_u16().to_be_bytes());
        if section != Section::Question {
            wire.extend_from_slice(&ttl.to_be_bytes());
            wire.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
            wire.extend_from_slice(&rdata);
        }

        let at = self.insertion_point(section);
        let inserted_len = wire.len();
        self.buffer.splice(at..at, wire);
        self.arena.shift_offsets_from(at, inserted_len as i64);
        Header::patch_count(&mut self.buffer, section.count_offset(), 1);
        self.header = Header::decode(&self.buffer)?;

        let record = ResourceRecord {
            section,
            name: name.to_string(),
            rtype,
            rclass,
            ttl: if section == Section::Question { 0 } else { ttl },
            rdata: if section == Section::Question { Bytes::new() } else { rdata },
            wire_offset: at,
            wire_size: inserted_len,
        };
        Ok(self.arena.push(record))
    }

    /// Removes a previously added (or parsed) resource, shrinking the wire
    /// buffer and decrementing its section's header count.
    pub fn remove_resource(&mut self, handle: ResourceHandle) -> Result<(), ParseError> {
        let record = self.arena.remove(handle).ok_or(ParseError::OutOfBounds)?;
        let at = record.wire_offset;
        let end = at + record.wire_size;
        self.buffer.splice(at..end, std::iter::empty());
        self.arena.shift_offsets_from(at, -(record.wire_size as i64));
        Header::patch_count(&mut self.buffer, record.section.count_offset(), -1);
        self.header = Header::decode(&self.buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_packet() -> Vec<u8> {
        // Header with qdcount=1, rest zero, followed by one question for
        // "example.com" A/IN.
        let mut buf = vec![
            0x12, 0x34, // id
            0x01, 0x00, // flags: RD set
            0x00, 0x01, // qdcount
            0x00, 0x00, // ancount
            0x00, 0x00, // nscount
            0x00, 0x00, // arcount
        ];
        buf.extend_from_slice(&encode_name("example.com").unwrap());
        buf.extend_from_slice(&1u16.to_be_bytes()); // QTYPE A
        buf.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN
        buf
    }

    #[test]
    fn parses_single_question() {
        let mut layer = DnsLayer::new(query_packet()).unwrap();
        assert!(layer.parse_resources(false));
        let q = layer.first(Section::Question).unwrap();
        assert_eq!(q.name, "example.com");
        assert_eq!(q.rtype, QType::A);
    }

    #[test]
    fn oversized_resource_count_fails_without_partial_state() {
        let mut buf = query_packet();
        buf[4] = 0xFF; // qdcount way over the 100 cap
        buf[5] = 0xFF;
        let mut layer = DnsLayer::new(buf).unwrap();
        assert!(!layer.parse_resources(false));
        assert!(layer.is_parse_failed());
        assert!(layer.first(Section::Question).is_none());
    }

    #[test]
    fn failed_parse_is_sticky_unless_forced() {
        let mut buf = query_packet();
        buf[4] = 0xFF;
        buf[5] = 0xFF;
        let mut layer = DnsLayer::new(buf).unwrap();
        assert!(!layer.parse_resources(false));
        assert!(!layer.parse_resources(false));
        // still fails on force (the underlying data didn't change), but it
        // does attempt the walk again rather than trusting the cache blindly.
        assert!(!layer.parse_resources(true));
    }

    #[test]
    fn add_then_remove_restores_original_bytes_and_counts() {
        let original = query_packet();
        let mut layer = DnsLayer::new(original.clone()).unwrap();
        assert!(layer.parse_resources(false));

        let handle = layer
            .add_resource(Section::Answer, "example.com", QType::A, QClass::In, 300, vec![
                93, 184, 216, 34,
            ])
            .unwrap();
        assert_eq!(layer.header().ancount, 1);
        assert_ne!(layer.wire(), original.as_slice());

        layer.remove_resource(handle).unwrap();
        assert_eq!(layer.header().ancount, 0);
        assert_eq!(layer.wire(), original.as_slice());
    }

    #[test]
    fn get_by_name_substring_match_is_case_sensitive() {
        let mut layer = DnsLayer::new(query_packet()).unwrap();
        layer.parse_resources(false);
        assert!(layer.get_by_name(Section::Question, "example", false).is_some());
        assert!(layer.get_by_name(Section::Question, "EXAMPLE", false).is_none());
    }

    #[test]
    fn dns_port_recognition() {
        assert!(is_dns_port(53));
        assert!(is_dns_port(5353));
        assert!(!is_dns_port(8080));
    }
}
