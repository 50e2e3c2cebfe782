// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event and artifact identifiers.
//!
//! Event ids are random UUIDs; `(vmId, eventId)` identifies an event for
//! the server. Artifact ids are integers rendered in base 36, matching the
//! server's artifact keyspace.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Server-assigned artifact identifier, rendered base-36 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactId(u64);

impl ArtifactId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut digits = [0u8; 13];
        let mut n = self.0;
        let mut i = digits.len();
        loop {
            i -= 1;
            digits[i] = BASE36[(n % 36) as usize];
            n /= 36;
            if n == 0 {
                break;
            }
        }
        // Digits are ASCII by construction.
        f.write_str(std::str::from_utf8(&digits[i..]).map_err(|_| std::fmt::Error)?)
    }
}

impl std::str::FromStr for ArtifactId {
    type Err = ParseArtifactIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseArtifactIdError);
        }
        let mut n: u64 = 0;
        for b in s.bytes() {
            let digit = match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'z' => b - b'a' + 10,
                b'A'..=b'Z' => b - b'A' + 10,
                _ => return Err(ParseArtifactIdError),
            };
            n = n
                .checked_mul(36)
                .and_then(|n| n.checked_add(digit as u64))
                .ok_or(ParseArtifactIdError)?;
        }
        Ok(Self(n))
    }
}

/// Invalid base-36 artifact id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid base-36 artifact id")]
pub struct ParseArtifactIdError;

/// Process-wide allocator so artifact ids never collide across
/// producers.
#[derive(Debug)]
pub struct ArtifactIdAllocator(std::sync::atomic::AtomicU64);

impl ArtifactIdAllocator {
    pub fn new() -> Self {
        Self(std::sync::atomic::AtomicU64::new(1))
    }

    pub fn next(&self) -> ArtifactId {
        ArtifactId(self.0.fetch_add(1, std::sync::atomic::Ordering::AcqRel))
    }
}

impl Default for ArtifactIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for ArtifactId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ArtifactId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
