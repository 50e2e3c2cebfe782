// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recognized agent options.
//!
//! Options arrive as `key=value` tokens from the command line and from
//! `AZ_CRS_ARGUMENTS` (same syntax, comma-separated; the caller splits).
//! Missing mandatory keys refuse startup. Unknown keys are collected for
//! the caller to warn about, never fatal.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Option parsing failures. All of these refuse startup.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("missing mandatory option: {0}")]
    MissingMandatory(&'static str),

    #[error("malformed option (expected key=value): {0}")]
    Malformed(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("invalid glob in {key}: {source}")]
    InvalidGlob {
        key: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Log channel verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Off,
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "off" => Ok(LogLevel::Off),
            _ => Err(()),
        }
    }
}

/// One `log[+tag]=<level>[+stack][+time]` option.
///
/// `stack` is per-channel; `time` is global (any option carrying it turns
/// timestamps on for the whole subscriber).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOption {
    pub tag: Option<String>,
    pub level: LogLevel,
    pub stack: bool,
    pub time: bool,
}

/// Allow/deny glob filter for inventory keys. Allow is consulted first;
/// a key must match an allow pattern and no deny pattern to be kept.
#[derive(Debug, Clone)]
pub struct InventoryFilter {
    allow: Vec<glob::Pattern>,
    deny: Vec<glob::Pattern>,
}

impl InventoryFilter {
    pub fn new(key: &str, allow: &str, deny: &str) -> Result<Self, OptionsError> {
        Ok(Self {
            allow: parse_globs(key, allow)?,
            deny: parse_globs(key, deny)?,
        })
    }

    pub fn keeps(&self, key: &str) -> bool {
        self.allow.iter().any(|p| p.matches(key)) && !self.deny.iter().any(|p| p.matches(key))
    }
}

fn parse_globs(key: &str, value: &str) -> Result<Vec<glob::Pattern>, OptionsError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            glob::Pattern::new(s).map_err(|source| OptionsError::InvalidGlob {
                key: key.to_string(),
                source,
            })
        })
        .collect()
}

/// Parsed agent options.
#[derive(Debug, Clone)]
pub struct Options {
    pub api_url: String,
    pub mailbox: String,
    pub access_key: Option<String>,
    pub keystore: Option<PathBuf>,
    pub heap_buffer_size: Option<usize>,
    pub file_system_buffer_size: Option<usize>,
    pub file_system_buffer_location: Option<PathBuf>,
    pub num_concurrent_connections: Option<usize>,
    pub backup_jfr_chunks: bool,
    pub delay_shutdown: Duration,
    pub environment_filter: InventoryFilter,
    pub system_properties_filter: InventoryFilter,
    pub log_options: Vec<LogOption>,
    /// Keys that were present but not recognized; caller warns on these.
    pub unknown: Vec<String>,
}

impl Options {
    /// Parse `key=value` tokens. Later tokens win over earlier ones, so
    /// command-line arguments should follow `AZ_CRS_ARGUMENTS` tokens.
    pub fn parse<I, S>(tokens: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut api_url = None;
        let mut mailbox = None;
        let mut access_key = None;
        let mut keystore = None;
        let mut heap_buffer_size = None;
        let mut file_system_buffer_size = None;
        let mut file_system_buffer_location = None;
        let mut num_concurrent_connections = None;
        let mut backup_jfr_chunks = false;
        let mut delay_shutdown = None;
        let mut env_allow = None;
        let mut env_deny = None;
        let mut props_allow = None;
        let mut props_deny = None;
        let mut log_options = Vec::new();
        let mut unknown = Vec::new();

        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| OptionsError::Malformed(token.to_string()))?;

            if key == "log" || key.starts_with("log+") {
                log_options.push(parse_log_option(key, value)?);
                continue;
            }

            match key {
                "api.url" => api_url = Some(value.to_string()),
                "api.mailbox" => mailbox = Some(value.to_string()),
                "accessKey" => access_key = Some(value.to_string()),
                "keystore" => keystore = Some(PathBuf::from(value)),
                "heapBufferSize" => heap_buffer_size = Some(parse_num(key, value)?),
                "fileSystemBufferSize" => file_system_buffer_size = Some(parse_num(key, value)?),
                "fileSystemBufferLocation" => {
                    file_system_buffer_location = Some(PathBuf::from(value))
                }
                "numConcurrentConnections" => {
                    num_concurrent_connections = Some(parse_num(key, value)?)
                }
                "backupJfrChunks" => backup_jfr_chunks = parse_bool(key, value)?,
                "delayShutdownInternal" => {
                    delay_shutdown = Some(Duration::from_millis(parse_num(key, value)? as u64))
                }
                "inventory.environment.allow" => env_allow = Some(value.to_string()),
                "inventory.environment.deny" => env_deny = Some(value.to_string()),
                "inventory.system.properties.allow" => props_allow = Some(value.to_string()),
                "inventory.system.properties.deny" => props_deny = Some(value.to_string()),
                _ => unknown.push(key.to_string()),
            }
        }

        let environment_filter = InventoryFilter::new(
            "inventory.environment",
            &env_allow.ok_or(OptionsError::MissingMandatory("inventory.environment.allow"))?,
            &env_deny.ok_or(OptionsError::MissingMandatory("inventory.environment.deny"))?,
        )?;
        let system_properties_filter = InventoryFilter::new(
            "inventory.system.properties",
            &props_allow
                .ok_or(OptionsError::MissingMandatory("inventory.system.properties.allow"))?,
            &props_deny
                .ok_or(OptionsError::MissingMandatory("inventory.system.properties.deny"))?,
        )?;

        Ok(Self {
            api_url: api_url.ok_or(OptionsError::MissingMandatory("api.url"))?,
            mailbox: mailbox.ok_or(OptionsError::MissingMandatory("api.mailbox"))?,
            access_key,
            keystore,
            heap_buffer_size,
            file_system_buffer_size,
            file_system_buffer_location,
            num_concurrent_connections,
            backup_jfr_chunks,
            delay_shutdown: delay_shutdown
                .ok_or(OptionsError::MissingMandatory("delayShutdownInternal"))?,
            environment_filter,
            system_properties_filter,
            log_options,
            unknown,
        })
    }

    /// Whether any log option requested global timestamps.
    pub fn log_time(&self) -> bool {
        self.log_options.iter().any(|o| o.time)
    }
}

fn parse_num(key: &str, value: &str) -> Result<usize, OptionsError> {
    value.parse().map_err(|_| OptionsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, OptionsError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(OptionsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parse `log[+tag]=<level>[+stack][+time]`.
fn parse_log_option(key: &str, value: &str) -> Result<LogOption, OptionsError> {
    let tag = key.strip_prefix("log").and_then(|rest| {
        rest.strip_prefix('+').map(str::to_string)
    });

    let mut parts = value.split('+');
    let level_text = parts.next().unwrap_or_default();
    let level: LogLevel = level_text.parse().map_err(|()| OptionsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })?;

    let mut stack = false;
    let mut time = false;
    for modifier in parts {
        match modifier {
            "stack" => stack = true,
            "time" => time = true,
            _ => {
                return Err(OptionsError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
        }
    }

    Ok(LogOption { tag, level, stack, time })
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
