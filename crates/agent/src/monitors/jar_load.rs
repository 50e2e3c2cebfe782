// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jar-load analysis and event emission.
//!
//! Consumes class sources through the observer seam, runs the hash
//! engine, and emits `VM_JAR_LOADED`. Oversized events are rerouted to a
//! LARGE_VM_EVENT artifact; inline events carry a signed request cookie
//! so the server can ask for details later. Nested-jar temp files are
//! retained until the server signals no further interest.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempPath;
use tracing::{debug, warn};

use crs_analyzer::{hex, AnalysisMode, JarAnalysis, JarAnalyzer};
use crs_core::{
    ArtifactIdAllocator, ArtifactType, Clock, EventPayload, JarInitiatedBy, JarLoadedPayload,
    VmArtifact, VmArtifactChunk, VmEvent,
};

use super::{ClassSource, ClassSourceObserver};
use crate::cookie::CookieCodec;
use crate::lifecycle::ShutdownSignal;
use crate::services::events::EventService;
use crate::services::server_requests::{DetailLevel, ServerRequest, ServerRequestListener};
use crate::services::uploads::{BytesChunkWriter, FileChunkWriter, UploadService};

/// Serialized events above this go out as LARGE_VM_EVENT artifacts.
pub const INLINE_EVENT_LIMIT: usize = 512 * 1024;

pub struct JarLoadMonitor<C: Clock> {
    analyzer: Arc<JarAnalyzer>,
    events: Arc<EventService>,
    uploads: Arc<UploadService>,
    /// Present only when the server-request service is enabled.
    codec: Option<Arc<CookieCodec>>,
    artifact_ids: Arc<ArtifactIdAllocator>,
    vm_id: String,
    clock: C,
    shutdown: Arc<ShutdownSignal>,
    /// fingerprint → retained nested-jar temp file.
    retained: Mutex<HashMap<String, TempPath>>,
}

impl<C: Clock> JarLoadMonitor<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        analyzer: Arc<JarAnalyzer>,
        events: Arc<EventService>,
        uploads: Arc<UploadService>,
        codec: Option<Arc<CookieCodec>>,
        artifact_ids: Arc<ArtifactIdAllocator>,
        vm_id: impl Into<String>,
        clock: C,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            analyzer,
            events,
            uploads,
            codec,
            artifact_ids,
            vm_id: vm_id.into(),
            clock,
            shutdown,
            retained: Mutex::new(HashMap::new()),
        }
    }

    /// Analyze one class source and emit jar-load events. Blocking file
    /// I/O; callers on async tasks wrap this in `spawn_blocking`.
    pub fn process_source(&self, source: &ClassSource) {
        let path = source.url.strip_prefix("file:").unwrap_or(&source.url);
        let deadline = self.shutdown.current();
        let analyses = match self.analyzer.analyze(
            Path::new(path),
            &source.url,
            source.loader_class.as_deref(),
            AnalysisMode::WithDetails,
            JarInitiatedBy::ClassLoading,
            deadline,
        ) {
            Ok(analyses) => analyses,
            Err(e) => {
                // Never destabilize the host over a bad jar.
                warn!(url = %source.url, error = %e, "jar analysis skipped");
                return;
            }
        };
        for analysis in analyses {
            self.emit(analysis);
        }
    }

    fn emit(&self, mut analysis: JarAnalysis) {
        let fingerprint = analysis.digest.fingerprint(analysis.entry_count);
        if let Some(temp) = analysis.temp_file.take() {
            self.retained.lock().insert(fingerprint.clone(), temp);
        }

        let mut payload = to_payload(analysis);
        if let Some(codec) = &self.codec {
            payload.request_cookie =
                Some(codec.encode(&[payload.url.as_str(), fingerprint.as_str()]));
        }

        let event = VmEvent::new(
            self.vm_id.clone(),
            self.clock.epoch_ms(),
            EventPayload::JarLoaded(Box::new(payload)),
        );
        let serialized_len = serde_json::to_string(&event).map(|s| s.len()).unwrap_or(0);
        if serialized_len > INLINE_EVENT_LIMIT {
            self.emit_large(event);
        } else {
            self.events.add(event);
        }
    }

    /// Store the full event as a LARGE_VM_EVENT artifact and emit a
    /// short event referencing it.
    fn emit_large(&self, event: VmEvent) {
        let EventPayload::JarLoaded(full) = &event.payload else {
            return;
        };
        let bytes = match serde_json::to_vec(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "large event serialization failed");
                return;
            }
        };

        let artifact = VmArtifact::new(
            self.artifact_ids.next(),
            ArtifactType::LargeVmEvent,
            format!("{}.event.json", full.jar_name),
            self.clock.epoch_ms(),
        );
        let chunk = VmArtifactChunk::new([artifact.artifact_id])
            .with_attr("size", bytes.len() as u64);
        self.uploads.post(chunk, Arc::new(BytesChunkWriter::new(bytes)));

        let mut short = (**full).clone();
        short.entries.clear();
        short.maven_components.clear();
        short.request_cookie = None;
        short.large_event_artifact_id = Some(artifact.artifact_id);
        debug!(jar = %short.jar_name, "jar event rerouted to artifact");
        self.events.add(VmEvent::new(
            self.vm_id.clone(),
            event.event_time_ms,
            EventPayload::JarLoaded(Box::new(short)),
        ));
    }

    /// Retained temp files, by fingerprint.
    pub fn retained_count(&self) -> usize {
        self.retained.lock().len()
    }

    /// Delete every retained temp file (shutdown path).
    pub fn release_all(&self) {
        self.retained.lock().clear();
    }
}

fn to_payload(analysis: JarAnalysis) -> JarLoadedPayload {
    JarLoadedPayload {
        url: analysis.url,
        jar_name: analysis.jar_name,
        central_directory_hash: hex(&analysis.digest.central_directory_hash),
        manifest_hash: analysis.digest.manifest_hash.map(|h| hex(&h)),
        provider: analysis.digest.provider,
        central_directory_len: analysis.digest.central_directory_len,
        entries: analysis.entries,
        maven_components: analysis.maven_components,
        initiated_by: analysis.initiated_by,
        recursion_depth: analysis.recursion_depth,
        request_cookie: None,
        large_event_artifact_id: None,
    }
}

impl<C: Clock> ClassSourceObserver for JarLoadMonitor<C> {
    fn observed(&self, source: &ClassSource) {
        self.process_source(source);
    }
}

impl<C: Clock> ServerRequestListener for JarLoadMonitor<C> {
    fn on_request(&self, request: &ServerRequest) {
        let ServerRequest::JarEntries { url, fingerprint, level } = request else {
            return;
        };
        match level {
            DetailLevel::None => {
                // No further interest: dropping the TempPath deletes it.
                if self.retained.lock().remove(fingerprint).is_some() {
                    debug!(url = %url, "released retained jar");
                }
            }
            DetailLevel::Full => {
                let path = self
                    .retained
                    .lock()
                    .get(fingerprint)
                    .map(|temp| temp.to_path_buf());
                if let Some(path) = path {
                    let artifact = VmArtifact::new(
                        self.artifact_ids.next(),
                        ArtifactType::Jar,
                        url.rsplit(['/', '!']).next().unwrap_or(url).to_string(),
                        self.clock.epoch_ms(),
                    );
                    let chunk = VmArtifactChunk::new([artifact.artifact_id]);
                    self.uploads.post(chunk, Arc::new(FileChunkWriter::new(path)));
                }
            }
            DetailLevel::Short => {}
        }
    }
}

#[cfg(test)]
#[path = "jar_load_tests.rs"]
mod tests;
