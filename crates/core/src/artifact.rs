// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifacts (logical files) and their upload chunks.
//!
//! Transient fields (presigned URLs, computed sizes) are neither
//! serialized nor equality-relevant.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ArtifactId;

/// Kind of a logical file associated with one VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactType {
    #[serde(rename = "GC_LOG")]
    GcLog,
    #[serde(rename = "VM_LOG")]
    VmLog,
    #[serde(rename = "CRS_LOG")]
    CrsLog,
    #[serde(rename = "JFR")]
    Jfr,
    #[serde(rename = "JAR")]
    Jar,
    #[serde(rename = "JAR_ENTRY")]
    JarEntry,
    #[serde(rename = "LARGE_VM_EVENT")]
    LargeVmEvent,
    #[serde(rename = "OTHER")]
    Other,
}

/// A logical file associated with one VM, patched as its state evolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmArtifact {
    #[serde(rename = "artifactId")]
    pub artifact_id: ArtifactId,
    #[serde(rename = "artifactType")]
    pub artifact_type: ArtifactType,
    pub filename: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "createTime")]
    pub create_time_ms: u64,

    /// Computed size; transient.
    #[serde(skip)]
    pub size: Option<u64>,
    /// Presigned upload URL; transient.
    #[serde(skip)]
    pub upload_url: Option<String>,
}

impl VmArtifact {
    pub fn new(
        artifact_id: ArtifactId,
        artifact_type: ArtifactType,
        filename: impl Into<String>,
        create_time_ms: u64,
    ) -> Self {
        Self {
            artifact_id,
            artifact_type,
            filename: filename.into(),
            metadata: BTreeMap::new(),
            create_time_ms,
            size: None,
            upload_url: None,
        }
    }
}

// Equality ignores transient fields.
impl PartialEq for VmArtifact {
    fn eq(&self, other: &Self) -> bool {
        self.artifact_id == other.artifact_id
            && self.artifact_type == other.artifact_type
            && self.filename == other.filename
            && self.metadata == other.metadata
            && self.create_time_ms == other.create_time_ms
    }
}

impl Eq for VmArtifact {}

/// A blob belonging to one or more artifacts; created per upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmArtifactChunk {
    #[serde(rename = "storageKey", default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    #[serde(rename = "artifactIds")]
    pub artifact_ids: BTreeSet<ArtifactId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Presigned PUT location; transient.
    #[serde(skip)]
    pub location: Option<String>,
}

impl VmArtifactChunk {
    pub fn new(artifact_ids: impl IntoIterator<Item = ArtifactId>) -> Self {
        Self {
            storage_key: None,
            artifact_ids: artifact_ids.into_iter().collect(),
            metadata: BTreeMap::new(),
            location: None,
        }
    }

    /// Attach a metadata attribute, JSON-encoding the value.
    pub fn with_attr(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
