// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! VM observation events.
//!
//! Serializes with the `{"vmId", "eventId", "eventType", "eventTime",
//! "eventPayload": {...}}` wire shape. The payload enum is tagged by
//! `eventType`, so an event whose type disagrees with its payload is
//! unrepresentable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ArtifactId, EventId};

/// Event type discriminants, used for per-type in-flight accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "VM_CLASS_LOADED")]
    ClassLoaded,
    #[serde(rename = "VM_METHOD_FIRST_CALLED")]
    MethodFirstCalled,
    #[serde(rename = "VM_TO_JAVA_CALL")]
    ToJavaCall,
    #[serde(rename = "VM_LOG_ENTRY")]
    LogEntry,
    #[serde(rename = "VM_JAR_LOADED")]
    JarLoaded,
    #[serde(rename = "VM_SHUTDOWN")]
    Shutdown,
}

/// Number of event types, for counter arrays.
pub const EVENT_TYPE_COUNT: usize = 6;

impl EventType {
    /// Stable index into per-type counter arrays.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One observation produced by a monitor. Immutable after enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmEvent {
    #[serde(rename = "vmId")]
    pub vm_id: String,
    #[serde(rename = "eventId")]
    pub event_id: EventId,
    #[serde(rename = "eventTime")]
    pub event_time_ms: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl VmEvent {
    /// New event with a fresh id.
    pub fn new(vm_id: impl Into<String>, event_time_ms: u64, payload: EventPayload) -> Self {
        Self {
            vm_id: vm_id.into(),
            event_id: EventId::generate(),
            event_time_ms,
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

/// Typed event payloads; the tag is the wire-level `eventType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "eventPayload")]
pub enum EventPayload {
    #[serde(rename = "VM_CLASS_LOADED")]
    ClassLoaded {
        #[serde(rename = "className")]
        class_name: String,
        #[serde(rename = "loaderName", default, skip_serializing_if = "Option::is_none")]
        loader_name: Option<String>,
        #[serde(rename = "sourceUrl", default, skip_serializing_if = "Option::is_none")]
        source_url: Option<String>,
    },

    #[serde(rename = "VM_METHOD_FIRST_CALLED")]
    MethodFirstCalled {
        #[serde(rename = "className")]
        class_name: String,
        #[serde(rename = "methodName")]
        method_name: String,
    },

    #[serde(rename = "VM_TO_JAVA_CALL")]
    ToJavaCall {
        #[serde(rename = "name")]
        name: String,
    },

    #[serde(rename = "VM_LOG_ENTRY")]
    LogEntry {
        level: String,
        message: String,
    },

    #[serde(rename = "VM_JAR_LOADED")]
    JarLoaded(Box<JarLoadedPayload>),

    #[serde(rename = "VM_SHUTDOWN")]
    Shutdown {
        #[serde(rename = "exitCode", default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::ClassLoaded { .. } => EventType::ClassLoaded,
            EventPayload::MethodFirstCalled { .. } => EventType::MethodFirstCalled,
            EventPayload::ToJavaCall { .. } => EventType::ToJavaCall,
            EventPayload::LogEntry { .. } => EventType::LogEntry,
            EventPayload::JarLoaded(_) => EventType::JarLoaded,
            EventPayload::Shutdown { .. } => EventType::Shutdown,
        }
    }
}

/// How a jar came to be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JarInitiatedBy {
    #[serde(rename = "CLASS_LOADING")]
    ClassLoading,
    #[serde(rename = "JDK_NATIVE_LOADING")]
    JdkNativeLoading,
    #[serde(rename = "RECURSIVE_LOADING")]
    RecursiveLoading,
    #[serde(rename = "SERVER_REQUEST")]
    ServerRequest,
    #[serde(rename = "OTHER")]
    Other,
}

/// Per-entry summary in a with-details jar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JarEntrySummary {
    pub crc: u32,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(rename = "shadedHash", default, skip_serializing_if = "Option::is_none")]
    pub shaded_hash: Option<String>,
}

/// Maven coordinates recovered from a `pom.properties` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MavenComponent {
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(rename = "artifactId")]
    pub artifact_id: String,
    pub version: String,
}

/// Payload of `VM_JAR_LOADED`.
///
/// The full form carries `entries`; the short form omits them and carries
/// either a `requestCookie` (server may ask for details later) or a
/// `largeEventArtifactId` (details were stored as a LARGE_VM_EVENT
/// artifact because the inline form exceeded the threshold).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JarLoadedPayload {
    pub url: String,
    #[serde(rename = "jarName")]
    pub jar_name: String,
    #[serde(rename = "centralDirectoryHash")]
    pub central_directory_hash: String,
    #[serde(rename = "manifestHash", default, skip_serializing_if = "Option::is_none")]
    pub manifest_hash: Option<String>,
    pub provider: String,
    #[serde(rename = "centralDirectoryLength")]
    pub central_directory_len: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entries: BTreeMap<String, JarEntrySummary>,
    #[serde(rename = "mavenComponents", default, skip_serializing_if = "Vec::is_empty")]
    pub maven_components: Vec<MavenComponent>,
    #[serde(rename = "initiatedBy")]
    pub initiated_by: JarInitiatedBy,
    #[serde(rename = "recursionDepth")]
    pub recursion_depth: u32,
    #[serde(rename = "requestCookie", default, skip_serializing_if = "Option::is_none")]
    pub request_cookie: Option<String>,
    #[serde(
        rename = "largeEventArtifactId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub large_event_artifact_id: Option<ArtifactId>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
