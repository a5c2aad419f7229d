//! 12-byte DNS message header (RFC 1035 §4.1.1). Bit-packed fields are read
//! with `bitstream-io`, mirroring the teacher's `dns::header` module.

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};
use std::io::Cursor;

use super::error::ParseError;
use super::types::{Opcode, ResponseCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

pub const HEADER_LEN: usize = 12;

impl Header {
    pub fn opcode(&self) -> Opcode {
        Opcode::from_u8(self.opcode)
    }

    pub fn rcode(&self) -> ResponseCode {
        ResponseCode::from_u8(self.rcode)
    }

    pub fn total_resources(&self) -> usize {
        self.qdcount as usize + self.ancount as usize + self.nscount as usize + self.arcount as usize
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < HEADER_LEN {
            return Err(ParseError::Truncated);
        }
        let mut reader = BitReader::endian(Cursor::new(buf), BigEndian);
        let id = reader.read_var::<u16>(16).map_err(|_| ParseError::Truncated)?;
        let qr = reader.read_var::<u8>(1).map_err(|_| ParseError::Truncated)? == 1;
        let opcode = reader.read_var::<u8>(4).map_err(|_| ParseError::Truncated)?;
        let aa = reader.read_var::<u8>(1).map_err(|_| ParseError::Truncated)? == 1;
        let tc = reader.read_var::<u8>(1).map_err(|_| ParseError::Truncated)? == 1;
        let rd = reader.read_var::<u8>(1).map_err(|_| ParseError::Truncated)? == 1;
        let ra = reader.read_var::<u8>(1).map_err(|_| ParseError::Truncated)? == 1;
        let z = reader.read_var::<u8>(3).map_err(|_| ParseError::Truncated)?;
        let rcode = reader.read_var::<u8>(4).map_err(|_| ParseError::Truncated)?;
        let qdcount = reader.read_var::<u16>(16).map_err(|_| ParseError::Truncated)?;
        let ancount = reader.read_var::<u16>(16).map_err(|_| ParseError::Truncated)?;
        let nscount = reader.read_var::<u16>(16).map_err(|_| ParseError::Truncated)?;
        let arcount = reader.read_var::<u16>(16).map_err(|_| ParseError::Truncated)?;

        Ok(Header {
            id,
            qr,
            opcode,
            aa,
            tc,
            rd,
            ra,
            z,
            rcode,
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = Vec::with_capacity(HEADER_LEN);
        {
            let mut writer = BitWriter::endian(&mut out, BigEndian);
            writer.write_var::<u16>(16, self.id).unwrap();
            writer.write_var::<u8>(1, self.qr as u8).unwrap();
            writer.write_var::<u8>(4, self.opcode).unwrap();
            writer.write_var::<u8>(1, self.aa as u8).unwrap();
            writer.write_var::<u8>(1, self.tc as u8).unwrap();
            writer.write_var::<u8>(1, self.rd as u8).unwrap();
            writer.write_var::<u8>(1, self.ra as u8).unwrap();
            writer.write_var::<u8>(3, self.z).unwrap();
            writer.write_var::<u8>(4, self.rcode).unwrap();
            writer.write_var::<u16>(16, self.qdcount).unwrap();
            writer.write_var::<u16>(16, self.ancount).unwrap();
            writer.write_var::<u16>(16, self.nscount).unwrap();
            writer.write_var::<u16>(16, self.arcount).unwrap();
        }
        let mut fixed = [0u8; HEADER_LEN];
        fixed.copy_from_slice(&out[..HEADER_LEN]);
        fixed
    }

    /// Rewrites a section count in place in a live wire buffer (used by
    /// `DnsLayer::add_resource`/`remove_resource`), without a full decode.
    pub fn patch_count(buf: &mut [u8], section_offset: usize, delta: i32) {
        let current = u16::from_be_bytes([buf[section_offset], buf[section_offset + 1]]);
        let updated = (current as i32 + delta).max(0) as u16;
        buf[section_offset..section_offset + 2].copy_from_slice(&updated.to_be_bytes());
    }
}
