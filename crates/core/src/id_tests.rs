// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn event_ids_are_distinct() {
    let a = EventId::generate();
    let b = EventId::generate();
    assert_ne!(a, b);
}

#[test]
fn event_id_serializes_as_uuid_string() {
    let id = EventId::generate();
    let json = serde_json::to_string(&id).unwrap();
    // "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx" plus quotes
    assert_eq!(json.len(), 38);
}

#[parameterized(
    zero = { 0, "0" },
    single = { 35, "z" },
    base = { 36, "10" },
    mixed = { 1_295, "zz" },
    large = { 4_294_967_295, "1z141z3" },
)]
fn artifact_id_renders_base36(raw: u64, expected: &str) {
    assert_eq!(ArtifactId::new(raw).to_string(), expected);
}

#[parameterized(
    zero = { "0", 0 },
    upper = { "ZZ", 1_295 },
    round = { "10", 36 },
)]
fn artifact_id_parses_base36(s: &str, expected: u64) {
    let id: ArtifactId = s.parse().unwrap();
    assert_eq!(id.raw(), expected);
}

#[parameterized(
    empty = { "" },
    punct = { "a-b" },
    overflow = { "zzzzzzzzzzzzzzzz" },
)]
fn artifact_id_rejects_invalid(s: &str) {
    assert!(s.parse::<ArtifactId>().is_err());
}

#[test]
fn allocator_hands_out_distinct_ids() {
    let allocator = ArtifactIdAllocator::new();
    let a = allocator.next();
    let b = allocator.next();
    assert_ne!(a, b);
    assert!(a.raw() >= 1);
}

#[test]
fn artifact_id_roundtrips_serde() {
    let id = ArtifactId::new(123_456_789);
    let json = serde_json::to_string(&id).unwrap();
    let back: ArtifactId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}

mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn base36_rendering_roundtrips(raw in any::<u64>()) {
            let rendered = ArtifactId::new(raw).to_string();
            let parsed: ArtifactId = rendered.parse().unwrap();
            prop_assert_eq!(parsed.raw(), raw);
        }
    }
}
