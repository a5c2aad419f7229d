//! Wire-format domain name encode/decode, including compression-pointer
//! resolution (spec.md §4.1; teacher's `dns/common.rs::read_labels_with_buffer`
//! for the byte-at-a-time label walk this mirrors).

use smallvec::SmallVec;
use std::collections::HashSet;

use super::error::ParseError;

const MAX_JUMPS: usize = 128;
const MAX_LABEL_LEN: u8 = 63;

/// Decode the name at `offset` in `buf`, following compression pointers as
/// needed. Returns the dotted name (root is `""`) and the number of bytes
/// consumed *at `offset`* in the original buffer — a followed pointer counts
/// as 2 bytes, regardless of how much data it points to elsewhere.
pub fn decode_name(buf: &[u8], offset: usize) -> Result<(String, usize), ParseError> {
    // Most names are well under 8 labels, so this stays off the heap for
    // the common case.
    let mut labels: SmallVec<[String; 8]> = SmallVec::new();
    let mut pos = offset;
    let mut wire_size: Option<usize> = None;
    let mut visited: HashSet<usize> = HashSet::new();
    let mut jumps = 0usize;

    loop {
        if pos >= buf.len() {
            return Err(ParseError::OutOfBounds);
        }
        let first = buf[pos];

        if first == 0 {
            if wire_size.is_none() {
                wire_size = Some(pos + 1 - offset);
            }
            break;
        }

        if first & 0xC0 == 0xC0 {
            if pos + 1 >= buf.len() {
                return Err(ParseError::OutOfBounds);
            }
            let pointer = (((first & 0x3F) as usize) << 8) | buf[pos + 1] as usize;
            if wire_size.is_none() {
                wire_size = Some(pos + 2 - offset);
            }
            if pointer >= buf.len() || !visited.insert(pos) {
                return Err(ParseError::CompressionLoop);
            }
            jumps += 1;
            if jumps > MAX_JUMPS {
                return Err(ParseError::CompressionLoop);
            }
            pos = pointer;
            continue;
        }

        if first & 0xC0 != 0 || first > MAX_LABEL_LEN {
            return Err(ParseError::InvalidLabel);
        }

        let len = first as usize;
        let start = pos + 1;
        let end = start + len;
        if end > buf.len() {
            return Err(ParseError::OutOfBounds);
        }
        let label = std::str::from_utf8(&buf[start..end])
            .map_err(|_| ParseError::InvalidLabel)?
            .to_string();
        labels.push(label);
        pos = end;
    }

    Ok((labels.join("."), wire_size.unwrap_or(0)))
}

/// Encode `name` in uncompressed wire format (length-prefixed labels, zero
/// terminator). Used by `add_resource`, which never emits compression.
pub fn encode_name(name: &str) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::new();
    if name.is_empty() {
        out.push(0);
        return Ok(out);
    }
    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN as usize {
            return Err(ParseError::InvalidLabel);
        }
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_name(name: &str) -> Vec<u8> {
        encode_name(name).unwrap()
    }

    #[test]
    fn round_trips_plain_name() {
        let wire = plain_name("www.example.com");
        let (decoded, size) = decode_name(&wire, 0).unwrap();
        assert_eq!(decoded, "www.example.com");
        assert_eq!(size, wire.len());
    }

    #[test]
    fn follows_compression_pointer() {
        // Buffer: [root name at 0] [pointer to 0 at offset 1]
        let mut buf = plain_name("example.com");
        let pointer_offset = buf.len();
        buf.push(0xC0);
        buf.push(0x00);
        let (decoded, size) = decode_name(&buf, pointer_offset).unwrap();
        assert_eq!(decoded, "example.com");
        assert_eq!(size, 2);
    }

    #[test]
    fn rejects_self_referencing_pointer_loop() {
        let mut buf = vec![0u8; 4];
        buf[0] = 0xC0;
        buf[1] = 0x00;
        let err = decode_name(&buf, 0).unwrap_err();
        assert_eq!(err, ParseError::CompressionLoop);
    }

    #[test]
    fn rejects_label_reaching_past_buffer() {
        let buf = vec![0x05, b'a', b'b'];
        let err = decode_name(&buf, 0).unwrap_err();
        assert_eq!(err, ParseError::OutOfBounds);
    }

    #[test]
    fn root_name_decodes_empty() {
        let buf = vec![0u8];
        let (decoded, size) = decode_name(&buf, 0).unwrap();
        assert_eq!(decoded, "");
        assert_eq!(size, 1);
    }
}
