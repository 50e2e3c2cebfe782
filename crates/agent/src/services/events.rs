// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event queueing and batching.
//!
//! Producers enqueue without blocking; overflow drops the event
//! (at-most-once, the producer does not retry). A small worker pool
//! drains the queue into size-bounded batches and hands them to the
//! connection manager. Per-type in-flight counters reach zero only when
//! every accepted event has been sent or dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crs_core::{Deadline, EventType, VmEvent, EVENT_TYPE_COUNT};

use crate::connection::{request_with_retries, ConnectionManager};
use crate::services::server_requests::ServerRequestService;

/// Queue capacity; overflow drops.
pub const MAX_QUEUE_SIZE: usize = 50_000;

/// Events per batch handed to the connection manager; byte-precise
/// framing happens there.
const MAX_BATCH_EVENTS: usize = 1_000;

/// Poll interval for deadline-bounded waits.
const WAIT_TICK: Duration = Duration::from_millis(50);

pub struct EventService {
    connection: Arc<ConnectionManager>,
    queue: Mutex<VecDeque<VmEvent>>,
    queued: Notify,
    idle: Notify,
    accepting: AtomicBool,
    inflight: [AtomicI64; EVENT_TYPE_COUNT],
    shutdown: CancellationToken,
    server_requests: Mutex<Option<Arc<ServerRequestService>>>,
    capacity: usize,
    max_retries: u32,
    retry_sleep: Duration,
}

impl EventService {
    pub fn new(
        connection: Arc<ConnectionManager>,
        max_retries: u32,
        retry_sleep: Duration,
    ) -> Arc<Self> {
        Self::with_capacity(connection, MAX_QUEUE_SIZE, max_retries, retry_sleep)
    }

    /// Queue capacity override (`heapBufferSize`).
    pub fn with_capacity(
        connection: Arc<ConnectionManager>,
        capacity: usize,
        max_retries: u32,
        retry_sleep: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection,
            queue: Mutex::new(VecDeque::new()),
            queued: Notify::new(),
            idle: Notify::new(),
            accepting: AtomicBool::new(true),
            inflight: Default::default(),
            shutdown: CancellationToken::new(),
            server_requests: Mutex::new(None),
            capacity: capacity.max(1),
            max_retries,
            retry_sleep,
        })
    }

    /// Wire the server-request service so embedded control messages in
    /// batch responses get dispatched.
    pub fn attach_server_requests(&self, service: Arc<ServerRequestService>) {
        *self.server_requests.lock() = Some(service);
    }

    /// Spawn the worker pool (default one worker).
    pub fn start(self: &Arc<Self>, workers: usize) -> Vec<JoinHandle<()>> {
        (0..workers.max(1))
            .map(|_| {
                let service = Arc::clone(self);
                tokio::spawn(service.worker_loop())
            })
            .collect()
    }

    /// Non-blocking enqueue. Returns false when the event was dropped
    /// (shutdown in progress or queue full).
    pub fn add(&self, event: VmEvent) -> bool {
        if !self.accepting.load(Ordering::Acquire) {
            return false;
        }
        let event_type = event.event_type();
        let len = {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                drop(queue);
                warn!(?event_type, "event queue full, dropping");
                self.connection.metrics().event_dropped();
                return false;
            }
            queue.push_back(event);
            queue.len()
        };
        self.inflight[event_type.index()].fetch_add(1, Ordering::AcqRel);
        self.connection.metrics().event_queued(len);
        self.queued.notify_one();
        true
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn inflight(&self, event_type: EventType) -> i64 {
        self.inflight[event_type.index()].load(Ordering::Acquire)
    }

    fn inflight_total(&self) -> i64 {
        self.inflight.iter().map(|c| c.load(Ordering::Acquire)).sum()
    }

    /// Block until every accepted event has been processed or the
    /// deadline expires. Returns true when fully drained.
    pub async fn wait_all_events_processed(&self, deadline: Deadline) -> bool {
        loop {
            if self.inflight_total() == 0 {
                return true;
            }
            let Some(wait) = deadline.checked(WAIT_TICK) else {
                return false;
            };
            let _ = tokio::time::timeout(wait, self.idle.notified()).await;
        }
    }

    /// Stop accepting new work immediately.
    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Drain against the deadline, then cancel the workers. Events left
    /// after the deadline are dropped.
    pub async fn stop(&self, deadline: Deadline) {
        self.stop_accepting();
        let drained = self.wait_all_events_processed(deadline).await;
        self.shutdown.cancel();
        self.queued.notify_waiters();
        if !drained {
            let remaining: Vec<VmEvent> = self.queue.lock().drain(..).collect();
            if !remaining.is_empty() {
                warn!(count = remaining.len(), "deadline expired, dropping queued events");
            }
            for event in &remaining {
                self.connection.metrics().event_dropped();
                self.decrement_one(event.event_type());
            }
        }
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let batch = self.next_batch();
            if batch.is_empty() {
                if self.shutdown.is_cancelled() {
                    break;
                }
                tokio::select! {
                    _ = self.shutdown.cancelled() => {}
                    _ = self.queued.notified() => {}
                }
                continue;
            }

            let result = request_with_retries(
                "sendEventBatch",
                self.max_retries,
                self.retry_sleep,
                self.connection.metrics(),
                || self.connection.send_event_batch(&batch),
            )
            .await;

            match result {
                Ok(bodies) => {
                    debug!(events = batch.len(), "batch delivered");
                    let server_requests = self.server_requests.lock().clone();
                    if let Some(service) = server_requests {
                        for body in &bodies {
                            service.enqueue_response_body(body);
                        }
                    }
                }
                Err(e) => {
                    warn!(events = batch.len(), error = %e, "batch delivery failed");
                    for _ in &batch {
                        self.connection.metrics().event_dropped();
                    }
                    if e.is_fatal() {
                        self.connection.report_fatal(&e);
                    }
                }
            }

            for event in &batch {
                self.decrement_one(event.event_type());
            }
            if self.inflight_total() == 0 {
                self.idle.notify_waiters();
            }
        }
        debug!("event worker stopped");
    }

    pub(crate) fn next_batch(&self) -> Vec<VmEvent> {
        let mut queue = self.queue.lock();
        let take = queue.len().min(MAX_BATCH_EVENTS);
        queue.drain(..take).collect()
    }

    fn decrement_one(&self, event_type: EventType) {
        let previous = self.inflight[event_type.index()].fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "in-flight counter went negative");
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
