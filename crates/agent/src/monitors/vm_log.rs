// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! VM log entries: events for every line, with a bounded tail kept for
//! the VM_LOG artifact.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crs_core::{
    ArtifactIdAllocator, ArtifactType, Clock, EventPayload, VmArtifact, VmArtifactChunk, VmEvent,
};

use crate::services::events::EventService;
use crate::services::uploads::{BytesChunkWriter, UploadService};

/// Lines of tail retained between flushes.
const TAIL_CAPACITY: usize = 4_096;

pub struct VmLogMonitor<C: Clock> {
    events: Arc<EventService>,
    uploads: Arc<UploadService>,
    vm_id: String,
    clock: C,
    artifact: VmArtifact,
    tail: Mutex<VecDeque<String>>,
}

impl<C: Clock> VmLogMonitor<C> {
    pub fn new(
        events: Arc<EventService>,
        uploads: Arc<UploadService>,
        artifact_ids: &ArtifactIdAllocator,
        vm_id: impl Into<String>,
        clock: C,
    ) -> Self {
        let artifact = VmArtifact::new(
            artifact_ids.next(),
            ArtifactType::VmLog,
            "vm.log",
            clock.epoch_ms(),
        );
        Self {
            events,
            uploads,
            vm_id: vm_id.into(),
            clock,
            artifact,
            tail: Mutex::new(VecDeque::with_capacity(TAIL_CAPACITY)),
        }
    }

    /// Host callback for one VM log line.
    pub fn on_log_entry(&self, level: &str, message: &str) {
        self.events.add(VmEvent::new(
            self.vm_id.clone(),
            self.clock.epoch_ms(),
            EventPayload::LogEntry { level: level.to_string(), message: message.to_string() },
        ));

        let mut tail = self.tail.lock();
        if tail.len() == TAIL_CAPACITY {
            tail.pop_front();
        }
        tail.push_back(format!("[{level}] {message}"));
    }

    /// Upload the buffered tail as a VM_LOG chunk and clear it.
    pub fn flush_tail(&self) {
        let lines: Vec<String> = {
            let mut tail = self.tail.lock();
            tail.drain(..).collect()
        };
        if lines.is_empty() {
            return;
        }
        let mut body = lines.join("\n");
        body.push('\n');
        let chunk = VmArtifactChunk::new([self.artifact.artifact_id])
            .with_attr("size", body.len() as u64);
        self.uploads.post(chunk, Arc::new(BytesChunkWriter::new(body.into_bytes())));
    }

    pub fn tail_len(&self) -> usize {
        self.tail.lock().len()
    }
}

#[cfg(test)]
#[path = "vm_log_tests.rs"]
mod tests;
