//! Organization-ID lookup by DNS name (spec.md §3 "OrgID KV entry", §4.7).
//! Backed by `sled` instead of the read-only LMDB store the original used —
//! sled's `get_lt` gives us the "largest key less than X" primitive the
//! longest-suffix walk needs for free, so there's no cursor bookkeeping.
//!
//! Keys are stored in "lookup format": wire labels reversed (TLD first) and
//! lowercased, each followed by a NUL separator, prefixed with a single
//! `DATA_PREFIX` byte so the keyspace can later carry other key shapes
//! without colliding. A name's org ID is found by walking from the full
//! name up towards the root, one label at a time, looking for the longest
//! registered suffix — the same zone-cut semantics a DNS resolver uses.

use crate::error::CoreError;

const DATA_PREFIX: u8 = 1;

/// Database of organization IDs keyed by DNS zone (spec.md §4.7).
pub struct OrgIdStore {
    tree: sled::Tree,
}

impl OrgIdStore {
    pub fn open(path: &str) -> Result<Self, CoreError> {
        let db = sled::open(path)?;
        let tree = db.open_tree("orgid")?;
        Ok(Self { tree })
    }

    /// In-memory store for tests and standalone deployments with no org-id
    /// data (spec.md §4.7 "EmptyOrgIDDatabase" placeholder).
    pub fn empty() -> Result<Self, CoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        let tree = db.open_tree("orgid")?;
        Ok(Self { tree })
    }

    /// Insert (or overwrite) the org ID for `name` (wire format). Used by
    /// tests and any offline load path; the daemon normally opens a
    /// pre-built store read-only.
    pub fn insert(&self, name: &[u8], org_id: u64) -> Result<(), CoreError> {
        let Some(key) = create_search_buffer(name) else {
            return Err(CoreError::Validation("malformed DNS name".to_string()));
        };
        self.tree.insert(key, &org_id.to_be_bytes())?;
        Ok(())
    }

    /// Find the organization ID for `name` (DNS wire format), or `None` if
    /// no zone covering it is registered. Never propagates an error: a
    /// malformed name or a backing-store hiccup is indistinguishable from
    /// "not found" on the hot path (spec.md §7).
    pub fn lookup_by_name(&self, name: &[u8]) -> Option<u64> {
        let mut search = create_search_buffer(name)?;

        loop {
            if let Ok(Some(value)) = self.tree.get(&search) {
                return decode_id(&value);
            }

            let (key, value) = match self.tree.get_lt(&search) {
                Ok(Some(pair)) => pair,
                _ => return None,
            };
            if !is_data_key(&key) {
                return None;
            }

            let suffix_len = key_common_suffix(&search, &key);
            if suffix_len == 0 {
                return None;
            }
            if suffix_len == key.len() {
                return decode_id(&value);
            }

            search.truncate(suffix_len);
        }
    }
}

fn decode_id(data: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = data.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

fn is_data_key(key: &[u8]) -> bool {
    key.first() == Some(&DATA_PREFIX)
}

/// Greatest index `i` such that `a[..i]` and `b[..i]` agree and `i` lands on
/// a label boundary (a NUL byte), scanning from offset 1 to skip the shared
/// `DATA_PREFIX`.
fn key_common_suffix(a: &[u8], b: &[u8]) -> usize {
    let len = a.len().min(b.len());
    let mut result = 0usize;
    let mut i = 1usize;
    while i < len {
        if a[i] != b[i] {
            break;
        }
        if a[i] == 0 {
            result = i + 1;
        }
        i += 1;
    }
    result
}

fn create_search_buffer(name: &[u8]) -> Option<Vec<u8>> {
    let lookup = encode_lookup_format(name)?;
    let mut buffer = Vec::with_capacity(lookup.len() + 1);
    buffer.push(DATA_PREFIX);
    buffer.extend_from_slice(&lookup);
    Some(buffer)
}

/// Strip leading labels up to (and including) the first one containing a
/// stray NUL byte, and lowercase ASCII letters. Rejects compressed names
/// and truncated/misterminated buffers.
fn normalize_lookup_name(name: &[u8]) -> Option<Vec<u8>> {
    let mut result = name.to_vec();
    let mut skip = 0usize;
    let mut i = 0usize;

    while i < result.len() && result[i] != 0 {
        let len = result[i] as usize;
        if len & 0xc0 != 0 {
            return None; // compression pointer, not supported here
        }
        i += 1;
        let next = i + len;
        if next >= result.len() {
            return None; // label runs past the buffer
        }

        let mut j = i;
        while j < next {
            if result[j] == 0 {
                skip = next;
                break;
            }
            if result[j].is_ascii_uppercase() {
                result[j] |= 0x20;
            }
            j += 1;
        }
        i = next;
    }

    if i + 1 != result.len() {
        return None; // wrong name termination
    }

    result.drain(0..skip);
    Some(result)
}

/// Reverses wire-format labels (TLD first) and normalizes, so that sibling
/// zones share a key prefix the longest-suffix walk can exploit.
fn encode_lookup_format(wire: &[u8]) -> Option<Vec<u8>> {
    let name = normalize_lookup_name(wire)?;

    let mut labels = Vec::new();
    let mut i = 0usize;
    while i < name.len() && name[i] > 0 {
        let len = name[i] as usize;
        let start = i + 1;
        let end = start + len;
        if end > name.len() {
            return None;
        }
        labels.push(&name[start..end]);
        i = end;
    }

    let mut result = Vec::with_capacity(name.len());
    for label in labels.iter().rev() {
        result.extend_from_slice(label);
        result.push(0);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_keeps_simple_name() {
        let input = [4, b'D', b'N', b'S', b'1', 3, b'P', b'0', b'1', 5, b'N', b'S', b'o', b'n', b'e', 3, b'N', b'E', b'T', 0];
        let expect = [4, b'd', b'n', b's', b'1', 3, b'p', b'0', b'1', 5, b'n', b's', b'o', b'n', b'e', 3, b'n', b'e', b't', 0];
        assert_eq!(normalize_lookup_name(&input).unwrap(), expect);
    }

    #[test]
    fn normalize_drops_labels_before_an_embedded_nul() {
        let input = [4, b'z', b'e', b'r', b'o', 5, b'b', b'y', 0, b't', b'e', 4, b't', b'e', b's', b't', 0];
        let expect = [4, b't', b'e', b's', b't', 0];
        assert_eq!(normalize_lookup_name(&input).unwrap(), expect);
    }

    #[test]
    fn normalize_rejects_compression_pointer() {
        let input = [3, b'w', b'w', b'w', 0xc0, 0x0a];
        assert!(normalize_lookup_name(&input).is_none());
    }

    #[test]
    fn normalize_rejects_truncated_label() {
        let input = [5, b't', b'e', b's', b't'];
        assert!(normalize_lookup_name(&input).is_none());
    }

    #[test]
    fn normalize_rejects_empty_buffer() {
        assert!(normalize_lookup_name(&[]).is_none());
    }

    #[test]
    fn encode_reverses_labels_and_appends_nul_separators() {
        let input = [3, b'w', b'w', b'w', 7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 4, b't', b'e', b's', b't', 0];
        let expect = [b't', b'e', b's', b't', 0, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0, b'w', b'w', b'w', 0];
        assert_eq!(encode_lookup_format(&input).unwrap(), expect);
    }

    #[test]
    fn encode_root_name_is_empty() {
        assert_eq!(encode_lookup_format(&[0]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn lookup_finds_exact_zone_match() {
        let store = OrgIdStore::empty().unwrap();
        let name = [3, b'n', b'e', b't', 0];
        store.insert(&name, 42).unwrap();
        assert_eq!(store.lookup_by_name(&name), Some(42));
    }

    #[test]
    fn lookup_finds_registered_parent_zone() {
        let store = OrgIdStore::empty().unwrap();
        let zone = [7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 4, b't', b'e', b's', b't', 0];
        store.insert(&zone, 7).unwrap();

        let name = [3, b'w', b'w', b'w', 7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 4, b't', b'e', b's', b't', 0];
        assert_eq!(store.lookup_by_name(&name), Some(7));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let store = OrgIdStore::empty().unwrap();
        let zone = [4, b't', b'e', b's', b't', 0];
        store.insert(&zone, 9).unwrap();

        let name = [4, b'T', b'E', b'S', b'T', 0];
        assert_eq!(store.lookup_by_name(&name), Some(9));
    }

    #[test]
    fn lookup_returns_none_for_unregistered_zone() {
        let store = OrgIdStore::empty().unwrap();
        let zone = [3, b'n', b'e', b't', 0];
        store.insert(&zone, 1).unwrap();

        let name = [3, b'o', b'r', b'g', 0];
        assert_eq!(store.lookup_by_name(&name), None);
    }

    #[test]
    fn lookup_does_not_match_sibling_with_shared_suffix_bytes() {
        let store = OrgIdStore::empty().unwrap();
        // "test.net" and "fastest.net" share trailing bytes ("test.net") but
        // are different labels; a naive byte-suffix match must not conflate them.
        let zone = [4, b't', b'e', b's', b't', 3, b'n', b'e', b't', 0];
        store.insert(&zone, 5).unwrap();

        let name = [7, b'f', b'a', b's', b't', b'e', b's', b't', 3, b'n', b'e', b't', 0];
        assert_eq!(store.lookup_by_name(&name), None);
    }
}
