// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn class_load_parses_optional_fields() {
    let n = HostNotification::parse("event:0:com/example/App|app-loader|file:/opt/app.jar")
        .unwrap();
    assert_eq!(
        n,
        HostNotification::ClassLoad {
            class_name: "com/example/App".into(),
            loader_name: Some("app-loader".into()),
            source_url: Some("file:/opt/app.jar".into()),
        }
    );

    let n = HostNotification::parse("event:0:com/example/App||").unwrap();
    assert_eq!(
        n,
        HostNotification::ClassLoad {
            class_name: "com/example/App".into(),
            loader_name: None,
            source_url: None,
        }
    );
}

#[test]
fn first_call_parses() {
    let n = HostNotification::parse("event:1:com/example/App|main").unwrap();
    assert_eq!(
        n,
        HostNotification::FirstCall {
            class_name: "com/example/App".into(),
            method_name: "main".into(),
        }
    );
}

#[test]
fn to_java_call_parses() {
    let n = HostNotification::parse("event:-98:com.example.Main").unwrap();
    assert_eq!(n, HostNotification::ToJavaCall { name: "com.example.Main".into() });
}

#[test]
fn vm_log_message_may_contain_pipes() {
    let n = HostNotification::parse("event:2:info|gc pause | young | 12ms").unwrap();
    assert_eq!(
        n,
        HostNotification::VmLogEntry {
            level: "info".into(),
            message: "gc pause | young | 12ms".into(),
        }
    );
}

#[test]
fn jfr_chunk_parses_numeric_fields() {
    let n = HostNotification::parse("event:jfr:/repo/c1.jfr|100|200|4096|7").unwrap();
    assert_eq!(
        n,
        HostNotification::JfrChunk {
            path: "/repo/c1.jfr".into(),
            start_time_ms: 100,
            end_time_ms: 200,
            size: 4096,
            recording_id: 7,
        }
    );
}

#[test]
fn jfr_recording_lifecycle_parses() {
    assert_eq!(
        HostNotification::parse("event:jfrstart:7").unwrap(),
        HostNotification::JfrRecordingStarted { recording_id: 7 }
    );
    assert_eq!(
        HostNotification::parse("event:jfrstop:7").unwrap(),
        HostNotification::JfrRecordingStopped { recording_id: 7 }
    );
    assert!(HostNotification::parse("event:jfrstart:x").is_err());
}

#[test]
fn main_method_probe_result_parses() {
    let n = HostNotification::parse("event:main:com.example.Main.main").unwrap();
    assert_eq!(n, HostNotification::MainMethodEntered { name: "com.example.Main.main".into() });
}

#[test]
fn control_frames_parse() {
    assert_eq!(HostNotification::parse("disableCRS()").unwrap(), HostNotification::DisableCrs);
    assert_eq!(
        HostNotification::parse("drainQueues(1,0)").unwrap(),
        HostNotification::DrainQueues { force: true, stop_after_drain: false }
    );
}

#[test]
fn malformed_frames_are_rejected() {
    for frame in [
        "event:0:onlyclass",
        "event:5:com/Foo||",
        "event:jfr:/p|1|2|3",
        "drainQueues(2,0)",
        "something else",
        "event:1:justclass",
    ] {
        assert!(
            matches!(HostNotification::parse(frame), Err(WireError::Malformed(_))),
            "expected malformed: {frame}"
        );
    }
}
