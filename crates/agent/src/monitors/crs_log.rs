// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent's own diagnostic log, streamed as CRS_LOG artifact chunks.
//!
//! Tracks a byte offset into the log file and ships only what is new on
//! each flush.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crs_core::{ArtifactIdAllocator, ArtifactType, Clock, VmArtifact, VmArtifactChunk};

use crate::services::uploads::{BytesChunkWriter, UploadService};

pub struct CrsLogMonitor {
    uploads: Arc<UploadService>,
    log_path: PathBuf,
    artifact: VmArtifact,
    offset: AtomicU64,
}

impl CrsLogMonitor {
    pub fn new<C: Clock>(
        uploads: Arc<UploadService>,
        artifact_ids: &ArtifactIdAllocator,
        log_path: PathBuf,
        clock: &C,
    ) -> Self {
        let artifact = VmArtifact::new(
            artifact_ids.next(),
            ArtifactType::CrsLog,
            "crs-agent.log",
            clock.epoch_ms(),
        );
        Self { uploads, log_path, artifact, offset: AtomicU64::new(0) }
    }

    /// Ship bytes appended since the last flush. Returns how many bytes
    /// were posted.
    pub fn flush(&self) -> u64 {
        let bytes = match std::fs::read(&self.log_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %self.log_path.display(), error = %e, "log not readable");
                return 0;
            }
        };
        let from = self.offset.load(Ordering::Acquire) as usize;
        if bytes.len() <= from {
            return 0;
        }
        let fresh = bytes[from..].to_vec();
        let posted = fresh.len() as u64;
        let chunk = VmArtifactChunk::new([self.artifact.artifact_id])
            .with_attr("offset", from as u64)
            .with_attr("size", posted);
        if self.uploads.post(chunk, Arc::new(BytesChunkWriter::new(fresh))) {
            self.offset.store(bytes.len() as u64, Ordering::Release);
            posted
        } else {
            0
        }
    }
}

#[cfg(test)]
#[path = "crs_log_tests.rs"]
mod tests;
