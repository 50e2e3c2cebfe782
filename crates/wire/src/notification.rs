// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unsolicited frames pushed by the host.
//!
//! Runtime callbacks arrive as `event:<typeId>:<fields>` with `|`-separated
//! fields; control frames reuse the command spelling (`disableCRS()`,
//! `drainQueues(f,s)`).

use crate::command::HostEventType;
use crate::frame::WireError;

/// A frame the host pushed without the agent asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNotification {
    ClassLoad {
        class_name: String,
        loader_name: Option<String>,
        source_url: Option<String>,
    },
    FirstCall {
        class_name: String,
        method_name: String,
    },
    ToJavaCall {
        name: String,
    },
    VmLogEntry {
        level: String,
        message: String,
    },
    JfrChunk {
        path: String,
        start_time_ms: u64,
        end_time_ms: u64,
        size: u64,
        recording_id: u64,
    },
    JfrRecordingStarted {
        recording_id: u64,
    },
    JfrRecordingStopped {
        recording_id: u64,
    },
    /// Host saw the application's main method enter.
    MainMethodEntered {
        name: String,
    },
    DisableCrs,
    DrainQueues {
        force: bool,
        stop_after_drain: bool,
    },
}

impl HostNotification {
    pub fn parse(frame: &str) -> Result<Self, WireError> {
        if frame == "disableCRS()" {
            return Ok(HostNotification::DisableCrs);
        }
        if let Some(args) = strip_call(frame, "drainQueues") {
            let (force, stop) = two_flags(frame, args)?;
            return Ok(HostNotification::DrainQueues { force, stop_after_drain: stop });
        }
        if let Some(rest) = frame.strip_prefix("event:") {
            return parse_event(frame, rest);
        }
        Err(WireError::Malformed(frame.to_string()))
    }
}

fn parse_event(frame: &str, rest: &str) -> Result<HostNotification, WireError> {
    let (tag, body) = rest
        .split_once(':')
        .ok_or_else(|| WireError::Malformed(frame.to_string()))?;

    if tag == "jfr" {
        let fields: Vec<&str> = body.split('|').collect();
        if fields.len() != 5 {
            return Err(WireError::Malformed(frame.to_string()));
        }
        return Ok(HostNotification::JfrChunk {
            path: fields[0].to_string(),
            start_time_ms: num(frame, fields[1])?,
            end_time_ms: num(frame, fields[2])?,
            size: num(frame, fields[3])?,
            recording_id: num(frame, fields[4])?,
        });
    }
    if tag == "jfrstart" {
        return Ok(HostNotification::JfrRecordingStarted { recording_id: num(frame, body)? });
    }
    if tag == "jfrstop" {
        return Ok(HostNotification::JfrRecordingStopped { recording_id: num(frame, body)? });
    }
    if tag == "main" {
        return Ok(HostNotification::MainMethodEntered { name: body.to_string() });
    }

    let id: i32 = tag.parse().map_err(|_| WireError::Malformed(frame.to_string()))?;
    let event_type =
        HostEventType::from_id(id).ok_or_else(|| WireError::Malformed(frame.to_string()))?;

    let fields: Vec<&str> = body.split('|').collect();
    match event_type {
        HostEventType::ClassLoad => {
            if fields.len() != 3 {
                return Err(WireError::Malformed(frame.to_string()));
            }
            Ok(HostNotification::ClassLoad {
                class_name: fields[0].to_string(),
                loader_name: non_empty(fields[1]),
                source_url: non_empty(fields[2]),
            })
        }
        HostEventType::FirstCall => {
            if fields.len() != 2 {
                return Err(WireError::Malformed(frame.to_string()));
            }
            Ok(HostNotification::FirstCall {
                class_name: fields[0].to_string(),
                method_name: fields[1].to_string(),
            })
        }
        HostEventType::ToJavaCall => Ok(HostNotification::ToJavaCall { name: body.to_string() }),
        HostEventType::VmLogEntry => {
            let (level, message) = body
                .split_once('|')
                .ok_or_else(|| WireError::Malformed(frame.to_string()))?;
            Ok(HostNotification::VmLogEntry {
                level: level.to_string(),
                message: message.to_string(),
            })
        }
    }
}

fn strip_call<'a>(frame: &'a str, name: &str) -> Option<&'a str> {
    frame.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')
}

fn two_flags(frame: &str, args: &str) -> Result<(bool, bool), WireError> {
    let (a, b) = args
        .split_once(',')
        .ok_or_else(|| WireError::Malformed(frame.to_string()))?;
    Ok((flag(frame, a)?, flag(frame, b)?))
}

fn flag(frame: &str, s: &str) -> Result<bool, WireError> {
    match s.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(WireError::Malformed(frame.to_string())),
    }
}

fn num(frame: &str, s: &str) -> Result<u64, WireError> {
    s.parse().map_err(|_| WireError::Malformed(frame.to_string()))
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
#[path = "notification_tests.rs"]
mod tests;
