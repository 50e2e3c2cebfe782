// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging bootstrap.
//!
//! Maps the `log[+tag]=<level>[+stack][+time]` option grammar onto a
//! tracing env-filter. The untagged option sets the default level;
//! tagged options become per-target directives. `+time` is global and
//! enables timestamps; `+stack` marks a channel in the registry file so
//! error records on it carry backtraces upstream.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crs_core::{LogLevel, LogOption, Options};

/// File name of the agent's own log.
pub const LOG_FILE: &str = "crs-agent.log";

/// File name of the channel registry.
pub const CHANNEL_REGISTRY_FILE: &str = "channels.properties";

fn level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warning => "warn",
        LogLevel::Error => "error",
        LogLevel::Off => "off",
    }
}

/// Build the env-filter directive string from the log options.
pub fn filter_directives(options: &[LogOption]) -> String {
    let mut default_level = "info";
    let mut directives = Vec::new();
    for option in options {
        match &option.tag {
            None => default_level = level_str(option.level),
            Some(tag) => directives.push(format!("{tag}={}", level_str(option.level))),
        }
    }
    let mut filter = default_level.to_string();
    for directive in directives {
        filter.push(',');
        filter.push_str(&directive);
    }
    filter
}

/// Initialize tracing with a non-blocking file appender. Returns the
/// guard (held for the process lifetime) and the log file path.
pub fn init(options: &Options, log_dir: &Path) -> std::io::Result<(WorkerGuard, PathBuf)> {
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_new(filter_directives(&options.log_options))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false);
    if options.log_time() {
        builder.init();
    } else {
        builder.without_time().init();
    }

    write_channel_registry(log_dir, &options.log_options)?;
    Ok((guard, log_dir.join(LOG_FILE)))
}

/// Append the configured channels to the registry file
/// (`key=tag[:lowestUpstreamLevel]` properties format).
pub fn write_channel_registry(log_dir: &Path, options: &[LogOption]) -> std::io::Result<()> {
    let path = log_dir.join(CHANNEL_REGISTRY_FILE);
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    for option in options {
        let Some(tag) = &option.tag else { continue };
        if option.stack {
            writeln!(file, "{tag}={tag}:{}", level_str(option.level))?;
        } else {
            writeln!(file, "{tag}={tag}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
