// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failures while digesting an archive or class file.
///
/// All of these skip the jar in question and never destabilize the host.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("not a zip archive: {0}")]
    NotAnArchive(String),

    #[error("malformed central directory: {0}")]
    BadCentralDirectory(String),

    #[error("unsupported compression method {method} for entry {name}")]
    UnsupportedMethod { name: String, method: u16 },

    #[error("malformed class file: {0}")]
    BadClassFile(String),

    #[error("unexpected opcode 0x{0:02x}")]
    UnexpectedOpcode(u8),

    #[error("read past end of buffer: offset {offset}, len {len}")]
    OutOfBounds { offset: u64, len: u64 },

    #[error("shutdown deadline expired during analysis")]
    DeadlineExpired,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
