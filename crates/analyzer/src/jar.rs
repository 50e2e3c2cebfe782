// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jar analysis: fingerprinting, entry digests, nested-jar recursion.
//!
//! Each observed jar is digested at most once per process. Two dedup
//! rings guard the work: one keyed by URL, one by the
//! `hex(centralDirectoryHash):entryCount` fingerprint, so the same
//! archive reached through different paths is still recognized.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crs_core::{Deadline, DedupRing, JarEntrySummary, JarInitiatedBy, MavenComponent};

use crate::buffer::RandomAccessBuffer;
use crate::error::AnalyzerError;
use crate::shaded::shaded_class_hash;
use crate::zip::{read_central_directory, CentralDirectory};

/// Lowercase hex of a digest.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Fingerprint of a jar, computed once per unique archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarShortDigest {
    pub central_directory_hash: [u8; 32],
    pub manifest_hash: Option<[u8; 32]>,
    pub provider: String,
    pub central_directory_len: u64,
}

impl JarShortDigest {
    /// Dedup key: `hex(cdHash):entryCount`.
    pub fn fingerprint(&self, entry_count: u64) -> String {
        format!("{}:{entry_count}", hex(&self.central_directory_hash))
    }
}

/// An opened archive, ready for digesting and entry reads.
pub struct JarArchive {
    buf: RandomAccessBuffer<File>,
    cd: CentralDirectory,
    provider: String,
}

impl JarArchive {
    pub fn central_directory(&self) -> &CentralDirectory {
        &self.cd
    }

    pub fn digest(&mut self) -> Result<JarShortDigest, AnalyzerError> {
        let central_directory_hash: [u8; 32] = Sha256::digest(&self.cd.bytes).into();
        let entries = self.cd.entries()?;
        let manifest_hash = match entries.iter().find(|e| e.name == "META-INF/MANIFEST.MF") {
            Some(entry) => {
                let bytes = self.cd.read_entry(&mut self.buf, entry)?;
                Some(Sha256::digest(&bytes).into())
            }
            None => None,
        };
        Ok(JarShortDigest {
            central_directory_hash,
            manifest_hash,
            provider: self.provider.clone(),
            central_directory_len: self.cd.bytes.len() as u64,
        })
    }

    fn read_entry(&mut self, entry: &crate::zip::CenEntry) -> Result<Vec<u8>, AnalyzerError> {
        self.cd.read_entry(&mut self.buf, entry)
    }
}

/// Opens an archive and locates its central directory. One
/// implementation per recognized jar-loader flavor plus the generic
/// stream-reading fallback.
pub trait CentralDirectoryProvider: Send + Sync {
    /// Provider tag carried in the jar-load event.
    fn tag(&self) -> &str;

    fn open(&self, path: &Path) -> Result<JarArchive, AnalyzerError>;
}

/// Fallback provider: plain file read through the page buffer.
pub struct GenericStreamProvider {
    page_size: usize,
}

impl GenericStreamProvider {
    pub fn new() -> Self {
        Self { page_size: crate::buffer::DEFAULT_PAGE_SIZE }
    }

    /// Buffer tuning (`fileSystemBufferSize`).
    pub fn with_page_size(page_size: usize) -> Self {
        Self { page_size: page_size.max(1) }
    }
}

impl Default for GenericStreamProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CentralDirectoryProvider for GenericStreamProvider {
    fn tag(&self) -> &str {
        "generic"
    }

    fn open(&self, path: &Path) -> Result<JarArchive, AnalyzerError> {
        let file = File::open(path)?;
        let mut buf = RandomAccessBuffer::with_page_size(
            file,
            self.page_size,
            crate::buffer::DEFAULT_PAGE_CAPACITY,
        )?;
        let cd = read_central_directory(&mut buf)?;
        Ok(JarArchive { buf, cd, provider: self.tag().to_string() })
    }
}

/// `loader class name → provider` map with the generic fallback.
/// A provider that fails open is invalidated so the next lookup falls
/// back.
pub struct ProviderRegistry {
    providers: Mutex<BTreeMap<String, Arc<dyn CentralDirectoryProvider>>>,
    fallback: Arc<dyn CentralDirectoryProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::with_fallback(Arc::new(GenericStreamProvider::new()))
    }

    pub fn with_fallback(fallback: Arc<dyn CentralDirectoryProvider>) -> Self {
        Self { providers: Mutex::new(BTreeMap::new()), fallback }
    }

    pub fn register(&self, loader_class: &str, provider: Arc<dyn CentralDirectoryProvider>) {
        self.providers.lock().insert(loader_class.to_string(), provider);
    }

    pub fn for_loader(&self, loader_class: Option<&str>) -> Arc<dyn CentralDirectoryProvider> {
        loader_class
            .and_then(|name| self.providers.lock().get(name).cloned())
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn invalidate(&self, loader_class: &str) {
        self.providers.lock().remove(loader_class);
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether to walk every entry or only fingerprint the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    WithDetails,
    Short,
}

/// Result of analyzing one archive (outer or nested).
pub struct JarAnalysis {
    pub url: String,
    pub jar_name: String,
    pub digest: JarShortDigest,
    pub entry_count: u64,
    pub entries: BTreeMap<String, JarEntrySummary>,
    pub maven_components: Vec<MavenComponent>,
    pub initiated_by: JarInitiatedBy,
    pub recursion_depth: u32,
    /// Scheduled-delete temp file backing a nested jar, retained only
    /// while the server may still request its details.
    pub temp_file: Option<tempfile::TempPath>,
}

/// The hash engine front-end. Process-wide; dedup state is interior.
pub struct JarAnalyzer {
    providers: ProviderRegistry,
    url_dedup: DedupRing<String>,
    fingerprint_dedup: DedupRing<String>,
    keep_nested_temp_files: bool,
}

impl JarAnalyzer {
    pub fn new(keep_nested_temp_files: bool) -> Self {
        Self::with_providers(keep_nested_temp_files, ProviderRegistry::new())
    }

    /// Buffer tuning (`fileSystemBufferSize`) flows into the fallback
    /// provider's page size.
    pub fn with_page_size(keep_nested_temp_files: bool, page_size: usize) -> Self {
        Self::with_providers(
            keep_nested_temp_files,
            ProviderRegistry::with_fallback(Arc::new(GenericStreamProvider::with_page_size(
                page_size,
            ))),
        )
    }

    pub fn with_providers(keep_nested_temp_files: bool, providers: ProviderRegistry) -> Self {
        Self {
            providers,
            url_dedup: DedupRing::default(),
            fingerprint_dedup: DedupRing::default(),
            keep_nested_temp_files,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Analyze a jar unless it was already processed. Returns the outer
    /// analysis followed by any nested archives, or an empty vec when
    /// the dedup sets already contain the jar.
    pub fn analyze(
        &self,
        path: &Path,
        url: &str,
        loader_class: Option<&str>,
        mode: AnalysisMode,
        initiated_by: JarInitiatedBy,
        deadline: Deadline,
    ) -> Result<Vec<JarAnalysis>, AnalyzerError> {
        self.analyze_at_depth(path, url, loader_class, mode, initiated_by, 0, deadline)
    }

    fn analyze_at_depth(
        &self,
        path: &Path,
        url: &str,
        loader_class: Option<&str>,
        mode: AnalysisMode,
        initiated_by: JarInitiatedBy,
        depth: u32,
        deadline: Deadline,
    ) -> Result<Vec<JarAnalysis>, AnalyzerError> {
        if deadline.expired() {
            return Err(AnalyzerError::DeadlineExpired);
        }
        if self.url_dedup.contains(&url.to_string()) {
            debug!(url, "jar already processed by url");
            return Ok(Vec::new());
        }

        let provider = self.providers.for_loader(loader_class);
        let mut archive = match provider.open(path) {
            Ok(archive) => archive,
            Err(e) => {
                if let Some(loader) = loader_class {
                    self.providers.invalidate(loader);
                }
                return Err(e);
            }
        };

        let digest = archive.digest()?;
        let entry_count = archive.cd.entry_count;
        let fingerprint = digest.fingerprint(entry_count);

        self.url_dedup.insert(url.to_string());
        if !self.fingerprint_dedup.insert(fingerprint) {
            debug!(url, "jar already processed by fingerprint");
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        let mut analysis = JarAnalysis {
            url: url.to_string(),
            jar_name: jar_name(url),
            digest,
            entry_count,
            entries: BTreeMap::new(),
            maven_components: Vec::new(),
            initiated_by,
            recursion_depth: depth,
            temp_file: None,
        };
        let mut nested = Vec::new();

        for entry in archive.cd.entries()? {
            if deadline.expired() {
                return Err(AnalyzerError::DeadlineExpired);
            }
            if entry.is_directory() {
                continue;
            }

            if mode == AnalysisMode::WithDetails {
                let mut summary = JarEntrySummary {
                    crc: entry.crc,
                    size: entry.uncompressed_size,
                    sha256: None,
                    shaded_hash: None,
                };
                if entry.is_class() {
                    let bytes = archive.read_entry(&entry)?;
                    summary.sha256 = Some(hex(&Sha256::digest(&bytes)));
                    summary.shaded_hash = Some(hex(&shaded_class_hash(&bytes)?));
                }
                analysis.entries.insert(entry.name.clone(), summary);

                if entry.name == "pom.properties" || entry.name.ends_with("/pom.properties") {
                    let bytes = archive.read_entry(&entry)?;
                    if let Some(component) = parse_pom_properties(&bytes) {
                        analysis.maven_components.push(component);
                    }
                }
            }

            if entry.is_nested_archive() {
                let bytes = archive.read_entry(&entry)?;
                let nested_url = format!("{url}!/{}", entry.name);
                match self.analyze_nested(&bytes, &nested_url, mode, depth + 1, deadline) {
                    Ok(children) => nested.extend(children),
                    Err(AnalyzerError::DeadlineExpired) => {
                        return Err(AnalyzerError::DeadlineExpired)
                    }
                    Err(e) => {
                        warn!(url = %nested_url, error = %e, "skipping nested archive");
                    }
                }
            }
        }

        results.push(analysis);
        results.extend(nested);
        Ok(results)
    }

    fn analyze_nested(
        &self,
        bytes: &[u8],
        url: &str,
        mode: AnalysisMode,
        depth: u32,
        deadline: Deadline,
    ) -> Result<Vec<JarAnalysis>, AnalyzerError> {
        let mut temp = tempfile::NamedTempFile::new()?;
        temp.write_all(bytes)?;
        temp.flush()?;
        let temp_path = temp.into_temp_path();

        let mut children = self.analyze_at_depth(
            &temp_path,
            url,
            None,
            mode,
            JarInitiatedBy::RecursiveLoading,
            depth,
            deadline,
        )?;

        // The temp file backs a possible later server request for entry
        // details; without that service it is deleted right away (drop).
        if self.keep_nested_temp_files {
            if let Some(direct_child) = children.iter_mut().find(|c| c.url == url) {
                direct_child.temp_file = Some(temp_path);
            }
        }
        Ok(children)
    }
}

/// Last path segment of a jar URL.
fn jar_name(url: &str) -> String {
    url.rsplit(['/', '!']).next().unwrap_or(url).to_string()
}

fn parse_pom_properties(bytes: &[u8]) -> Option<MavenComponent> {
    let text = String::from_utf8_lossy(bytes);
    let mut group_id = None;
    let mut artifact_id = None;
    let mut version = None;
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "groupId" => group_id = Some(value.trim().to_string()),
                "artifactId" => artifact_id = Some(value.trim().to_string()),
                "version" => version = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    Some(MavenComponent {
        group_id: group_id?,
        artifact_id: artifact_id?,
        version: version?,
    })
}

#[cfg(test)]
#[path = "jar_tests.rs"]
mod tests;
