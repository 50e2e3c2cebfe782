// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One runtime session as the server sees it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Server-visible state of a VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmState {
    #[serde(rename = "REGISTERED")]
    Registered,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "TERMINATED")]
    Terminated,
    #[serde(rename = "OFFLINE")]
    Offline,
}

/// One runtime session. Created at startup, patched with networks and
/// system info while running, terminated on shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmInstance {
    #[serde(rename = "vmId", default, skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<String>,
    #[serde(rename = "agentVersion")]
    pub agent_version: String,
    #[serde(rename = "agentRevision")]
    pub agent_revision: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inventory: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "startTime")]
    pub start_time_ms: u64,
    pub state: VmState,
}

impl VmInstance {
    pub fn new(
        agent_version: impl Into<String>,
        agent_revision: impl Into<String>,
        start_time_ms: u64,
    ) -> Self {
        Self {
            vm_id: None,
            agent_version: agent_version.into(),
            agent_revision: agent_revision.into(),
            inventory: BTreeMap::new(),
            start_time_ms,
            state: VmState::Registered,
        }
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
