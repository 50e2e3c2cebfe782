// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::monitors::testutil::test_events;
use crs_core::{EventType, FakeClock};
use parking_lot::Mutex;

#[derive(Default)]
struct Recorder {
    sources: Mutex<Vec<ClassSource>>,
}

impl ClassSourceObserver for Recorder {
    fn observed(&self, source: &ClassSource) {
        self.sources.lock().push(source.clone());
    }
}

#[tokio::test]
async fn class_load_emits_event_and_forwards_jar_source() {
    let events = test_events();
    let recorder = Arc::new(Recorder::default());
    let monitor = ClassLoadMonitor::new(
        Arc::clone(&events),
        Arc::clone(&recorder) as Arc<dyn ClassSourceObserver>,
        "vm-1",
        FakeClock::new(),
    );

    monitor.on_class_load("com/example/App", Some("app-loader"), Some("file:/opt/app.jar"));

    assert_eq!(events.queue_len(), 1);
    assert_eq!(events.inflight(EventType::ClassLoaded), 1);
    assert_eq!(
        *recorder.sources.lock(),
        vec![ClassSource {
            url: "file:/opt/app.jar".into(),
            loader_class: Some("app-loader".into()),
        }]
    );
}

#[tokio::test]
async fn non_jar_sources_are_not_forwarded() {
    let events = test_events();
    let recorder = Arc::new(Recorder::default());
    let monitor = ClassLoadMonitor::new(
        events,
        Arc::clone(&recorder) as Arc<dyn ClassSourceObserver>,
        "vm-1",
        FakeClock::new(),
    );

    monitor.on_class_load("com/example/Gen", None, Some("jrt:/java.base"));
    monitor.on_class_load("com/example/Dyn", None, None);

    assert!(recorder.sources.lock().is_empty());
}

#[tokio::test]
async fn war_sources_are_forwarded() {
    let events = test_events();
    let recorder = Arc::new(Recorder::default());
    let monitor = ClassLoadMonitor::new(
        events,
        Arc::clone(&recorder) as Arc<dyn ClassSourceObserver>,
        "vm-1",
        FakeClock::new(),
    );
    monitor.on_class_load("a/B", None, Some("file:/srv/site.war"));
    assert_eq!(recorder.sources.lock().len(), 1);
}
