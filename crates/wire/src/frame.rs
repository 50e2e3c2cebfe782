// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed frame codec.
//!
//! A frame is a 4-ASCII-digit decimal length followed by that many UTF-8
//! bytes. We write zero-padded lengths; on read we also accept a
//! space-padded (right-justified) prefix from the peer.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload expressible in a 4-digit prefix.
pub const MAX_FRAME_LEN: usize = 9999;

/// Errors from frame I/O.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("bad length prefix: {0:?}")]
    BadLengthPrefix([u8; 4]),

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Write one frame: zero-padded 4-digit length, then the payload bytes.
pub async fn write_frame<W>(writer: &mut W, payload: &str) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = payload.as_bytes();
    if bytes.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(bytes.len()));
    }
    let prefix = format!("{:04}", bytes.len());
    writer.write_all(prefix.as_bytes()).await?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. Returns `ConnectionClosed` on a clean EOF before the
/// prefix.
pub async fn read_frame<R>(reader: &mut R) -> Result<String, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(WireError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = parse_prefix(&prefix)?;
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => WireError::ConnectionClosed,
            _ => WireError::Io(e),
        })?;

    String::from_utf8(payload).map_err(|_| WireError::InvalidUtf8)
}

fn parse_prefix(prefix: &[u8; 4]) -> Result<usize, WireError> {
    let mut len = 0usize;
    let mut seen_digit = false;
    for &b in prefix {
        match b {
            b' ' if !seen_digit => continue,
            b'0'..=b'9' => {
                seen_digit = true;
                len = len * 10 + (b - b'0') as usize;
            }
            _ => return Err(WireError::BadLengthPrefix(*prefix)),
        }
    }
    if !seen_digit {
        return Err(WireError::BadLengthPrefix(*prefix));
    }
    Ok(len)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
