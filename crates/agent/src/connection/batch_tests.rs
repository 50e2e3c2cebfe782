// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crs_core::{EventPayload, VmEvent};

fn log_event(message: String) -> VmEvent {
    VmEvent::new("vm-1", 1, EventPayload::LogEntry { level: "info".into(), message })
}

#[test]
fn empty_batch_produces_no_fragments() {
    let plan = fragment_events(&[]);
    assert!(plan.fragments.is_empty());
    assert!(plan.dropped.is_empty());
}

#[test]
fn small_batch_fits_one_fragment() {
    let events: Vec<VmEvent> = (0..10).map(|i| log_event(format!("m{i}"))).collect();
    let plan = fragment_events(&events);
    assert_eq!(plan.fragments.len(), 1);
    assert_eq!(plan.fragments[0].count, 10);

    // The fragment is a parseable JSON array of all events.
    let parsed: Vec<serde_json::Value> =
        serde_json::from_str(&plan.fragments[0].body).unwrap();
    assert_eq!(parsed.len(), 10);
}

#[test]
fn every_fragment_respects_the_size_bound() {
    // ~600 KiB per event forces several fragments.
    let events: Vec<VmEvent> =
        (0..8).map(|_| log_event("x".repeat(600 * 1024))).collect();
    let plan = fragment_events(&events);

    assert!(plan.fragments.len() > 1);
    let total: usize = plan.fragments.iter().map(|f| f.count).sum();
    assert_eq!(total, 8);
    for fragment in &plan.fragments {
        assert!(fragment.body.len() <= MAX_REQUEST_BYTES);
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&fragment.body).unwrap();
        assert_eq!(parsed.len(), fragment.count);
    }
}

#[test]
fn no_event_appears_in_two_fragments() {
    let events: Vec<VmEvent> =
        (0..6).map(|i| log_event(format!("{i}-{}", "y".repeat(700 * 1024)))).collect();
    let plan = fragment_events(&events);

    let mut seen = std::collections::HashSet::new();
    for fragment in &plan.fragments {
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&fragment.body).unwrap();
        for event in parsed {
            let id = event["eventId"].as_str().unwrap().to_string();
            assert!(seen.insert(id), "event appeared twice");
        }
    }
    assert_eq!(seen.len(), 6);
}

#[test]
fn oversized_single_event_is_dropped_with_prefix() {
    let big = log_event("z".repeat(3 * 1024 * 1024));
    let small = log_event("ok".into());
    let plan = fragment_events(&[big, small]);

    assert_eq!(plan.fragments.len(), 1);
    assert_eq!(plan.fragments[0].count, 1);
    assert_eq!(plan.dropped.len(), 1);
    let (event_type, prefix) = &plan.dropped[0];
    assert_eq!(*event_type, crs_core::EventType::LogEntry);
    assert_eq!(prefix.chars().count(), 100);
}

#[test]
fn boundary_event_exactly_at_limit_is_kept() {
    // Serialized length close to (but under) the bound still ships.
    let event = log_event("b".repeat(MAX_REQUEST_BYTES - 300));
    let plan = fragment_events(&[event]);
    assert_eq!(plan.fragments.len(), 1);
    assert!(plan.dropped.is_empty());
}
