// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn class_loaded() -> EventPayload {
    EventPayload::ClassLoaded {
        class_name: "com/example/App".into(),
        loader_name: None,
        source_url: Some("file:/opt/app.jar".into()),
    }
}

#[test]
fn wire_shape_has_flat_type_and_nested_payload() {
    let event = VmEvent::new("vm-1", 1_234, class_loaded());
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["vmId"], "vm-1");
    assert_eq!(json["eventTime"], 1_234);
    assert_eq!(json["eventType"], "VM_CLASS_LOADED");
    assert_eq!(json["eventPayload"]["className"], "com/example/App");
    assert!(json["eventId"].is_string());
}

#[test]
fn event_type_is_derived_from_payload() {
    let event = VmEvent::new("vm-1", 0, EventPayload::Shutdown { exit_code: Some(0) });
    assert_eq!(event.event_type(), EventType::Shutdown);
}

#[test]
fn distinct_events_have_distinct_ids() {
    let a = VmEvent::new("vm-1", 0, class_loaded());
    let b = VmEvent::new("vm-1", 0, class_loaded());
    assert_ne!(a.event_id, b.event_id);
}

#[test]
fn event_roundtrips_through_json() {
    let event = VmEvent::new(
        "vm-9",
        99,
        EventPayload::MethodFirstCalled {
            class_name: "a/b/C".into(),
            method_name: "main".into(),
        },
    );
    let json = serde_json::to_string(&event).unwrap();
    let back: VmEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(event, back);
}

#[test]
fn jar_loaded_short_form_omits_entries() {
    let payload = JarLoadedPayload {
        url: "file:/opt/app.jar".into(),
        jar_name: "app.jar".into(),
        central_directory_hash: "00".repeat(32),
        manifest_hash: None,
        provider: "generic".into(),
        central_directory_len: 512,
        entries: BTreeMap::new(),
        maven_components: vec![],
        initiated_by: JarInitiatedBy::ClassLoading,
        recursion_depth: 0,
        request_cookie: Some("abc".into()),
        large_event_artifact_id: None,
    };
    let json = serde_json::to_value(EventPayload::JarLoaded(Box::new(payload))).unwrap();

    assert_eq!(json["eventType"], "VM_JAR_LOADED");
    assert_eq!(json["eventPayload"]["initiatedBy"], "CLASS_LOADING");
    assert!(json["eventPayload"].get("entries").is_none());
    assert!(json["eventPayload"].get("manifestHash").is_none());
}

#[test]
fn every_event_type_has_a_stable_index() {
    let types = [
        EventType::ClassLoaded,
        EventType::MethodFirstCalled,
        EventType::ToJavaCall,
        EventType::LogEntry,
        EventType::JarLoaded,
        EventType::Shutdown,
    ];
    assert_eq!(types.len(), EVENT_TYPE_COUNT);
    for (i, t) in types.iter().enumerate() {
        assert_eq!(t.index(), i);
    }
}
