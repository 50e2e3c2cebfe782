// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide performance accumulators.
//!
//! Created once at agent init and passed explicitly; no globals. Maxima
//! use compare-and-swap loops so a concurrent larger observation is never
//! overwritten by a smaller one.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Accumulators for the agent pipeline.
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    events_queued: AtomicU64,
    events_sent: AtomicU64,
    events_dropped: AtomicU64,
    bytes_sent: AtomicU64,
    requests: AtomicU64,
    retries: AtomicU64,
    handshakes: AtomicU64,
    chunks_uploaded: AtomicU64,
    max_queue_len: AtomicU64,
    max_inflight_uploads: AtomicU64,
    max_buffer_pages: AtomicU64,
}

/// Point-in-time copy of the accumulators, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_queued: u64,
    pub events_sent: u64,
    pub events_dropped: u64,
    pub bytes_sent: u64,
    pub requests: u64,
    pub retries: u64,
    pub handshakes: u64,
    pub chunks_uploaded: u64,
    pub max_queue_len: u64,
    pub max_inflight_uploads: u64,
    pub max_buffer_pages: u64,
}

fn store_max(cell: &AtomicU64, value: u64) {
    let mut current = cell.load(Ordering::Relaxed);
    while value > current {
        match cell.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(observed) => current = observed,
        }
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_queued(&self, queue_len: usize) {
        self.events_queued.fetch_add(1, Ordering::Relaxed);
        store_max(&self.max_queue_len, queue_len as u64);
    }

    pub fn events_sent(&self, count: u64, bytes: u64) {
        self.events_sent.fetch_add(count, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake(&self) {
        self.handshakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upload_queued(&self, inflight: usize) {
        store_max(&self.max_inflight_uploads, inflight as u64);
    }

    pub fn chunk_uploaded(&self) {
        self.chunks_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn buffer_pages(&self, pages: usize) {
        store_max(&self.max_buffer_pages, pages as u64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_queued: self.events_queued.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            handshakes: self.handshakes.load(Ordering::Relaxed),
            chunks_uploaded: self.chunks_uploaded.load(Ordering::Relaxed),
            max_queue_len: self.max_queue_len.load(Ordering::Relaxed),
            max_inflight_uploads: self.max_inflight_uploads.load(Ordering::Relaxed),
            max_buffer_pages: self.max_buffer_pages.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
