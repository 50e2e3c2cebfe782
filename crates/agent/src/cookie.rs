// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signed request cookies.
//!
//! A cookie is `base64(digest || "|" || field1 || "|" || … || fieldN)`
//! where `digest` is an HMAC-SHA256 (keyed with a session-unique secret)
//! of everything after the separator. The server echoes cookies back
//! verbatim; a mismatched digest or field count rejects the cookie
//! without processing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const DIGEST_LEN: usize = 32;

/// A cookie that failed digest or shape validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid request cookie")]
pub struct InvalidCookie;

/// Encoder/decoder bound to one session key.
pub struct CookieCodec {
    key: [u8; 32],
}

impl CookieCodec {
    /// Fresh session-unique key.
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        key[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        key[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self { key }
    }

    /// Fixed key, for tests.
    pub fn with_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Encode fields into a signed cookie. Fields must not contain `|`.
    pub fn encode(&self, fields: &[&str]) -> String {
        let payload = fields.join("|");
        let digest = self.digest(payload.as_bytes());

        let mut raw = Vec::with_capacity(DIGEST_LEN + 1 + payload.len());
        raw.extend_from_slice(&digest);
        raw.push(b'|');
        raw.extend_from_slice(payload.as_bytes());
        BASE64.encode(raw)
    }

    /// Decode and validate; the field count must match the cookie shape.
    pub fn decode(&self, encoded: &str, expected_fields: usize) -> Result<Vec<String>, InvalidCookie> {
        let raw = BASE64.decode(encoded).map_err(|_| InvalidCookie)?;
        if raw.len() < DIGEST_LEN + 1 || raw[DIGEST_LEN] != b'|' {
            return Err(InvalidCookie);
        }
        let (digest, rest) = raw.split_at(DIGEST_LEN);
        let payload = &rest[1..];

        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| InvalidCookie)?;
        mac.update(payload);
        mac.verify_slice(digest).map_err(|_| InvalidCookie)?;

        let payload = std::str::from_utf8(payload).map_err(|_| InvalidCookie)?;
        let fields: Vec<String> = payload.split('|').map(str::to_string).collect();
        if fields.len() != expected_fields {
            return Err(InvalidCookie);
        }
        Ok(fields)
    }

    fn digest(&self, payload: &[u8]) -> [u8; DIGEST_LEN] {
        // Key length is fixed at 32; new_from_slice cannot fail for HMAC.
        let mut mac = match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts any key length"),
        };
        mac.update(payload);
        mac.finalize().into_bytes().into()
    }
}

impl Default for CookieCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cookie_tests.rs"]
mod tests;
