// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the agent crate.

/// Agent version reported to the server.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Agent revision (build hash) reported to the server.
pub const AGENT_REVISION: &str = env!("BUILD_GIT_HASH");

/// `clientVersion` + revision as sent in `x-agent-version`.
pub fn agent_version_string() -> String {
    format!("{AGENT_VERSION}+{AGENT_REVISION}")
}

/// Path of the native host's command socket, when the host provides one.
pub fn host_socket() -> Option<std::path::PathBuf> {
    std::env::var("AZ_CRS_HOST_SOCKET").ok().filter(|s| !s.is_empty()).map(Into::into)
}

/// Shared secret for the command-socket handshake.
pub fn host_secret() -> Option<String> {
    std::env::var("AZ_CRS_HOST_SECRET").ok().filter(|s| !s.is_empty())
}

/// Option tokens from `AZ_CRS_ARGUMENTS`, comma-separated with the same
/// `key=value` syntax as command-line arguments. Command-line tokens are
/// appended afterwards so they win.
pub fn option_tokens(args: impl Iterator<Item = String>) -> Vec<String> {
    let mut tokens: Vec<String> = std::env::var("AZ_CRS_ARGUMENTS")
        .ok()
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    tokens.extend(args);
    tokens
}
