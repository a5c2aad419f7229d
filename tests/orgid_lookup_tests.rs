//! OrgID longest-suffix lookup end-to-end coverage (spec.md §8 property 6
//! and the uppercase/trailing-dot scenario).

use wireloom::orgid::OrgIdStore;

fn wire_name(labels: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for label in labels {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    out
}

/// Builds the fixture: `example.com`=2, `www.example.com`=4 (a more
/// specific zone registered separately from its parent),
/// `foo.example.com`=3, `test`=5. `com` itself is never registered.
fn fixture() -> OrgIdStore {
    let store = OrgIdStore::empty().unwrap();
    store.insert(&wire_name(&["example", "com"]), 2).unwrap();
    store.insert(&wire_name(&["www", "example", "com"]), 4).unwrap();
    store.insert(&wire_name(&["foo", "example", "com"]), 3).unwrap();
    store.insert(&wire_name(&["test"]), 5).unwrap();
    store
}

#[test]
fn longest_suffix_lookup_matches_the_fixture() {
    let store = fixture();

    assert_eq!(store.lookup_by_name(&wire_name(&["www", "example", "com"])), Some(4));
    assert_eq!(store.lookup_by_name(&wire_name(&["sub", "example", "com"])), Some(2));
    assert_eq!(store.lookup_by_name(&wire_name(&["foo", "example", "com"])), Some(3));
    assert_eq!(store.lookup_by_name(&wire_name(&["example", "com"])), Some(2));
    assert_eq!(store.lookup_by_name(&wire_name(&["test"])), Some(5));
    assert_eq!(store.lookup_by_name(&wire_name(&["unknown", "invalid"])), None);
}

#[test]
fn uppercase_wire_name_is_normalized_before_lookup() {
    let store = fixture();
    // "WWW.EXAMPLE.COM." in wire form: uppercase labels, trailing root
    // label already implied by the zero terminator wire_name() appends.
    let name = wire_name(&["WWW", "EXAMPLE", "COM"]);
    assert_eq!(store.lookup_by_name(&name), Some(4));
}

#[test]
fn deeper_unregistered_subdomain_still_resolves_to_nearest_registered_zone() {
    let store = fixture();
    let name = wire_name(&["a", "b", "c", "example", "com"]);
    assert_eq!(store.lookup_by_name(&name), Some(2));
}
