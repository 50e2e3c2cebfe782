// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JFR chunk pipeline.
//!
//! The runtime reports finished repository chunks asynchronously from
//! any thread. Each chunk is pinned against deletion, attributed to the
//! recordings that contain it, and queued for upload with a monotonic
//! sequence number. A failed upload is not retried here; the pin is
//! released and the server notices the missing sequence number.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crs_core::{ArtifactId, ArtifactIdAllocator, VmArtifactChunk};

use crate::services::uploads::{FileChunkWriter, UploadService};

/// Pins repository chunks against deletion while an upload is in
/// flight. Implemented by the host adapter.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Returns false when the chunk could not be pinned (already gone).
    async fn use_chunk(&self, path: &str, in_use: bool) -> bool;
}

pub struct JfrMonitor {
    uploads: Arc<UploadService>,
    repository: Arc<dyn ChunkRepository>,
    /// Monotonic across all recordings.
    sequence: AtomicU64,
    recordings: Mutex<BTreeMap<u64, ArtifactId>>,
    artifact_ids: Arc<ArtifactIdAllocator>,
    /// `backupJfrChunks`: copy chunks here before upload so the data
    /// survives the runtime deleting its repository.
    backup_dir: Option<PathBuf>,
    accepting: AtomicBool,
}

impl JfrMonitor {
    pub fn new(
        uploads: Arc<UploadService>,
        repository: Arc<dyn ChunkRepository>,
        artifact_ids: Arc<ArtifactIdAllocator>,
    ) -> Arc<Self> {
        Self::with_backup_dir(uploads, repository, artifact_ids, None)
    }

    pub fn with_backup_dir(
        uploads: Arc<UploadService>,
        repository: Arc<dyn ChunkRepository>,
        artifact_ids: Arc<ArtifactIdAllocator>,
        backup_dir: Option<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            uploads,
            repository,
            sequence: AtomicU64::new(0),
            recordings: Mutex::new(BTreeMap::new()),
            artifact_ids,
            backup_dir,
            accepting: AtomicBool::new(true),
        })
    }

    /// Register a recording and allocate its artifact id.
    pub fn recording_started(&self, recording_id: u64) -> ArtifactId {
        let artifact = self.artifact_ids.next();
        self.recordings.lock().insert(recording_id, artifact);
        debug!(recording_id, %artifact, "recording registered");
        artifact
    }

    pub fn recording_stopped(&self, recording_id: u64) {
        self.recordings.lock().remove(&recording_id);
    }

    /// Stop accepting chunk callbacks (shutdown).
    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Handle a `nextChunk` callback.
    pub async fn next_chunk(
        &self,
        path: &str,
        start_time_ms: u64,
        end_time_ms: u64,
        size: u64,
        recording_id: u64,
    ) {
        if !self.accepting.load(Ordering::Acquire) {
            return;
        }
        if !self.repository.use_chunk(path, true).await {
            warn!(path, "chunk vanished before it could be pinned");
            return;
        }

        let chunk = self.build_chunk(path, start_time_ms, end_time_ms, size, recording_id);

        // With a backup directory the chunk is copied out first; the
        // repository pin can then be released early and the upload reads
        // the copy.
        let backup = match &self.backup_dir {
            Some(dir) => {
                let sequence = chunk.metadata["sequenceNumber"].as_u64().unwrap_or(0);
                let name = std::path::Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "chunk.jfr".to_string());
                let target = dir.join(format!("{sequence}-{name}"));
                match tokio::fs::copy(path, &target).await {
                    Ok(_) => {
                        self.repository.use_chunk(path, false).await;
                        Some(target)
                    }
                    Err(e) => {
                        warn!(path, error = %e, "chunk backup failed, uploading in place");
                        None
                    }
                }
            }
            None => None,
        };

        let writer = match backup {
            Some(backup_path) => {
                let cleanup = backup_path.clone();
                FileChunkWriter::with_release(
                    backup_path,
                    Box::new(move |_success| {
                        let _ = std::fs::remove_file(&cleanup);
                    }),
                )
            }
            None => {
                let repository = Arc::clone(&self.repository);
                let release_path = path.to_string();
                FileChunkWriter::with_release(
                    PathBuf::from(path),
                    Box::new(move |_success| {
                        // Release the pin whether or not the PUT succeeded.
                        tokio::spawn(async move {
                            repository.use_chunk(&release_path, false).await;
                        });
                    }),
                )
            }
        };

        if !self.uploads.post(chunk, Arc::new(writer)) {
            self.repository.use_chunk(path, false).await;
        }
    }

    /// Attribute the chunk and assign its sequence number.
    fn build_chunk(
        &self,
        path: &str,
        start_time_ms: u64,
        end_time_ms: u64,
        size: u64,
        recording_id: u64,
    ) -> VmArtifactChunk {
        // Recordings containing this chunk, excluding the reporting one;
        // when it is the only recording, its own artifact keeps the
        // chunk from being orphaned.
        let artifact_ids: Vec<ArtifactId> = {
            let recordings = self.recordings.lock();
            let others: Vec<ArtifactId> = recordings
                .iter()
                .filter(|(id, _)| **id != recording_id)
                .map(|(_, artifact)| *artifact)
                .collect();
            if others.is_empty() {
                recordings.get(&recording_id).copied().into_iter().collect()
            } else {
                others
            }
        };

        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        VmArtifactChunk::new(artifact_ids)
            .with_attr("startTime", start_time_ms)
            .with_attr("endTime", end_time_ms)
            .with_attr("size", size)
            .with_attr("path", path)
            .with_attr("sequenceNumber", sequence)
    }
}

#[cfg(test)]
#[path = "jfr_tests.rs"]
mod tests;
