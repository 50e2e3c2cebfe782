// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::connection::{ConnectionConfig, ConnectionManager};
use crs_core::{EventPayload, PerformanceMetrics, SystemClock};
use std::time::Instant;

fn connection() -> Arc<ConnectionManager> {
    let config = ConnectionConfig {
        api_url: "https://unreachable.invalid".into(),
        mailbox: "m".into(),
        access_key: None,
        keystore: None,
        client_version: "1.0".into(),
        agent_revision: "rev".into(),
        request_timeout: Duration::from_secs(1),
    };
    Arc::new(ConnectionManager::new(config, Arc::new(PerformanceMetrics::new())).unwrap())
}

fn event() -> VmEvent {
    VmEvent::new("vm-1", 1, EventPayload::ToJavaCall { name: "main".into() })
}

fn service() -> Arc<EventService> {
    EventService::new(connection(), 0, Duration::from_millis(1))
}

#[tokio::test]
async fn add_is_accepted_and_counted() {
    let service = service();
    assert!(service.add(event()));
    assert_eq!(service.queue_len(), 1);
    assert_eq!(service.inflight(EventType::ToJavaCall), 1);
    assert_eq!(service.inflight(EventType::Shutdown), 0);
}

#[tokio::test]
async fn overflow_drops_and_reports() {
    let service = service();
    for _ in 0..MAX_QUEUE_SIZE {
        assert!(service.add(event()));
    }
    assert!(!service.add(event()));
    assert_eq!(service.queue_len(), MAX_QUEUE_SIZE);
    assert_eq!(service.connection.metrics().snapshot().events_dropped, 1);
}

#[tokio::test]
async fn stop_accepting_rejects_new_events() {
    let service = service();
    service.stop_accepting();
    assert!(!service.add(event()));
    assert_eq!(service.queue_len(), 0);
}

#[tokio::test]
async fn wait_all_returns_immediately_when_nothing_inflight() {
    let service = service();
    let deadline = Deadline::after(&SystemClock, Duration::from_secs(5));
    let started = Instant::now();
    assert!(service.wait_all_events_processed(deadline).await);
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn wait_all_times_out_at_the_deadline() {
    let service = service();
    service.add(event()); // no worker running, never drains
    let deadline = Deadline::after(&SystemClock, Duration::from_millis(120));
    let started = Instant::now();
    assert!(!service.wait_all_events_processed(deadline).await);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "overran deadline: {elapsed:?}");
}

#[tokio::test]
async fn stop_drops_remaining_work_after_deadline() {
    let service = service();
    for _ in 0..5 {
        service.add(event());
    }
    let deadline = Deadline::after(&SystemClock, Duration::from_millis(60));
    service.stop(deadline).await;

    assert_eq!(service.queue_len(), 0);
    assert_eq!(service.inflight(EventType::ToJavaCall), 0);
    assert!(service.connection.metrics().snapshot().events_dropped >= 5);
}

#[tokio::test]
async fn queue_length_feeds_the_max_tracker() {
    let service = service();
    for _ in 0..7 {
        service.add(event());
    }
    assert_eq!(service.connection.metrics().snapshot().max_queue_len, 7);
}
