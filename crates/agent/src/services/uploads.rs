// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Out-of-band artifact uploads.
//!
//! A single-worker FIFO queue services jobs: create the chunk against
//! the server, then stream the writer's bytes to the presigned URL.
//! The writer is always notified on completion so external resources
//! (JFR chunk locks, temp files) get released either way.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crs_core::{Deadline, VmArtifactChunk};

use crate::connection::{ChunkWriter, ConnectionManager};

/// Poll interval for deadline-bounded waits.
const WAIT_TICK: Duration = Duration::from_millis(50);

struct Job {
    chunk: VmArtifactChunk,
    writer: Arc<dyn ChunkWriter>,
}

pub struct UploadService {
    connection: Arc<ConnectionManager>,
    queue: Mutex<VecDeque<Job>>,
    queued: Notify,
    idle: Notify,
    busy: AtomicBool,
    accepting: AtomicBool,
    shutdown: CancellationToken,
}

impl UploadService {
    pub fn new(connection: Arc<ConnectionManager>) -> Arc<Self> {
        Arc::new(Self {
            connection,
            queue: Mutex::new(VecDeque::new()),
            queued: Notify::new(),
            idle: Notify::new(),
            busy: AtomicBool::new(false),
            accepting: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn the single upload worker.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(service.worker_loop())
    }

    /// Enqueue a chunk upload. Returns false when rejected (shutdown).
    pub fn post(&self, chunk: VmArtifactChunk, writer: Arc<dyn ChunkWriter>) -> bool {
        if !self.accepting.load(Ordering::Acquire) {
            return false;
        }
        let len = {
            let mut queue = self.queue.lock();
            queue.push_back(Job { chunk, writer });
            queue.len()
        };
        self.connection.metrics().upload_queued(len);
        self.queued.notify_one();
        true
    }

    /// Jobs queued or in transfer.
    pub fn pending(&self) -> usize {
        self.queue.lock().len() + usize::from(self.busy.load(Ordering::Acquire))
    }

    /// Block until the current queue is drained.
    pub async fn sync(&self) {
        while self.pending() > 0 {
            let _ = tokio::time::timeout(WAIT_TICK, self.idle.notified()).await;
        }
    }

    /// Stop accepting, drain until the deadline, then cancel.
    pub async fn stop(&self, deadline: Deadline) {
        self.accepting.store(false, Ordering::Release);
        loop {
            if self.pending() == 0 {
                break;
            }
            let Some(wait) = deadline.checked(WAIT_TICK) else {
                break;
            };
            let _ = tokio::time::timeout(wait, self.idle.notified()).await;
        }
        self.shutdown.cancel();
        self.queued.notify_waiters();

        // Whatever is left will never upload; release the writers.
        let leftover: Vec<Job> = self.queue.lock().drain(..).collect();
        if !leftover.is_empty() {
            warn!(count = leftover.len(), "deadline expired, abandoning uploads");
        }
        for job in leftover {
            job.writer.complete(false).await;
        }
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let popped = self.queue.lock().pop_front();
            let job = match popped {
                Some(job) => job,
                None => {
                    if self.shutdown.is_cancelled() {
                        break;
                    }
                    self.idle.notify_waiters();
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {}
                        _ = self.queued.notified() => {}
                    }
                    continue;
                }
            };

            self.busy.store(true, Ordering::Release);
            let result = self
                .connection
                .send_artifact_chunk(&job.chunk, job.writer.as_ref())
                .await;
            match &result {
                Ok(storage_key) => {
                    self.connection.metrics().chunk_uploaded();
                    debug!(storage_key = %storage_key, "chunk upload complete");
                }
                // No retry at this layer; the server notices the gap.
                Err(e) => warn!(error = %e, "chunk upload failed"),
            }
            job.writer.complete(result.is_ok()).await;
            self.busy.store(false, Ordering::Release);
            if self.pending() == 0 {
                self.idle.notify_waiters();
            }
        }
        debug!("upload worker stopped");
    }
}

/// Writer streaming a file from disk, with a release hook for chunk
/// locks.
pub struct FileChunkWriter {
    path: PathBuf,
    on_complete: Mutex<Option<Box<dyn FnOnce(bool) + Send>>>,
}

impl FileChunkWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path, on_complete: Mutex::new(None) }
    }

    pub fn with_release(path: PathBuf, release: Box<dyn FnOnce(bool) + Send>) -> Self {
        Self { path, on_complete: Mutex::new(Some(release)) }
    }
}

#[async_trait]
impl ChunkWriter for FileChunkWriter {
    async fn body(&self) -> std::io::Result<reqwest::Body> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file)))
    }

    async fn complete(&self, success: bool) {
        if let Some(release) = self.on_complete.lock().take() {
            release(success);
        }
    }
}

/// Writer holding its payload in memory (log tails, large events).
pub struct BytesChunkWriter {
    bytes: Vec<u8>,
}

impl BytesChunkWriter {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

#[async_trait]
impl ChunkWriter for BytesChunkWriter {
    async fn body(&self) -> std::io::Result<reqwest::Body> {
        Ok(reqwest::Body::from(self.bytes.clone()))
    }

    async fn complete(&self, _success: bool) {}
}

#[cfg(test)]
#[path = "uploads_tests.rs"]
mod tests;
