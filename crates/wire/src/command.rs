// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands the agent issues to the native host, and the host's replies.

use crate::frame::WireError;

/// Event type ids shared with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventType {
    ToJavaCall,
    ClassLoad,
    FirstCall,
    VmLogEntry,
}

impl HostEventType {
    pub fn id(&self) -> i32 {
        match self {
            HostEventType::ToJavaCall => -98,
            HostEventType::ClassLoad => 0,
            HostEventType::FirstCall => 1,
            HostEventType::VmLogEntry => 2,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            -98 => Some(HostEventType::ToJavaCall),
            0 => Some(HostEventType::ClassLoad),
            1 => Some(HostEventType::FirstCall),
            2 => Some(HostEventType::VmLogEntry),
            _ => None,
        }
    }
}

/// A command frame sent to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    DisableCrs,
    RegisterAgent { class_name: String },
    EnableEventNotifications { event_type: HostEventType, enabled: bool },
    DrainQueues { force: bool, stop_after_drain: bool },
    RegisterCallback { event_type: HostEventType, method: String },
    GetCapabilities,
    /// Pin or release a JFR repository chunk against deletion.
    UseRepositoryChunk { path: String, in_use: bool },
    /// Poll for the detected main method; empty reply until known.
    GetMainMethod,
}

impl HostCommand {
    /// Render the command in `name(arg,…)` form.
    pub fn format(&self) -> String {
        match self {
            HostCommand::DisableCrs => "disableCRS()".to_string(),
            HostCommand::RegisterAgent { class_name } => {
                format!("registerAgent({class_name})")
            }
            HostCommand::EnableEventNotifications { event_type, enabled } => {
                format!(
                    "enableEventNotifications({},{})",
                    event_type.id(),
                    u8::from(*enabled)
                )
            }
            HostCommand::DrainQueues { force, stop_after_drain } => {
                format!("drainQueues({},{})", u8::from(*force), u8::from(*stop_after_drain))
            }
            HostCommand::RegisterCallback { event_type, method } => {
                format!("registerCallback({},{})", event_type.id(), method)
            }
            HostCommand::GetCapabilities => "getCapabilities()".to_string(),
            HostCommand::UseRepositoryChunk { path, in_use } => {
                format!("useRepositoryChunk({},{})", path, u8::from(*in_use))
            }
            HostCommand::GetMainMethod => "getMainMethod()".to_string(),
        }
    }
}

/// Reply to a command: `ok`, `ok:<value>`, or `error:<message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostReply {
    Ok,
    Value(String),
    Error(String),
}

impl HostReply {
    /// True when the frame is a reply rather than a notification.
    pub fn is_reply_frame(frame: &str) -> bool {
        frame == "ok" || frame.starts_with("ok:") || frame.starts_with("error:")
    }

    pub fn parse(frame: &str) -> Result<Self, WireError> {
        if frame == "ok" {
            return Ok(HostReply::Ok);
        }
        if let Some(value) = frame.strip_prefix("ok:") {
            return Ok(HostReply::Value(value.to_string()));
        }
        if let Some(message) = frame.strip_prefix("error:") {
            return Ok(HostReply::Error(message.to_string()));
        }
        Err(WireError::Malformed(frame.to_string()))
    }

    /// Comma-separated capability tokens out of a `getCapabilities` reply.
    pub fn capabilities(&self) -> Vec<String> {
        match self {
            HostReply::Value(v) if !v.is_empty() => {
                v.split(',').map(|s| s.trim().to_string()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
