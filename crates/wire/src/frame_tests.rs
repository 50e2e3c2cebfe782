// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[tokio::test]
async fn write_then_read_roundtrips() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, "getCapabilities()").await.unwrap();

    assert_eq!(&buffer[..4], b"0017");

    let mut cursor = std::io::Cursor::new(buffer);
    let frame = read_frame(&mut cursor).await.unwrap();
    assert_eq!(frame, "getCapabilities()");
}

#[tokio::test]
async fn empty_payload_roundtrips() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, "").await.unwrap();
    assert_eq!(buffer, b"0000");

    let mut cursor = std::io::Cursor::new(buffer);
    assert_eq!(read_frame(&mut cursor).await.unwrap(), "");
}

#[tokio::test]
async fn space_padded_prefix_is_accepted() {
    let mut data = Vec::from(&b"  17"[..]);
    data.extend_from_slice(b"getCapabilities()");
    let mut cursor = std::io::Cursor::new(data);
    assert_eq!(read_frame(&mut cursor).await.unwrap(), "getCapabilities()");
}

#[parameterized(
    letters = { *b"12ab" },
    all_spaces = { *b"    " },
    trailing_space = { *b"12 3" },
)]
fn bad_prefixes_are_rejected(prefix: [u8; 4]) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let mut data = Vec::from(&prefix[..]);
        data.extend_from_slice(&[b'x'; 16]);
        let mut cursor = std::io::Cursor::new(data);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(WireError::BadLengthPrefix(_))
        ));
    });
}

#[tokio::test]
async fn oversized_payload_is_refused_on_write() {
    let payload = "x".repeat(MAX_FRAME_LEN + 1);
    let mut buffer = Vec::new();
    assert!(matches!(
        write_frame(&mut buffer, &payload).await,
        Err(WireError::FrameTooLarge(_))
    ));
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn eof_before_prefix_reports_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    assert!(matches!(
        read_frame(&mut cursor).await,
        Err(WireError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn eof_mid_payload_reports_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::from(&b"0010abc"[..]));
    assert!(matches!(
        read_frame(&mut cursor).await,
        Err(WireError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn invalid_utf8_is_rejected() {
    let mut data = Vec::from(&b"0002"[..]);
    data.extend_from_slice(&[0xff, 0xfe]);
    let mut cursor = std::io::Cursor::new(data);
    assert!(matches!(read_frame(&mut cursor).await, Err(WireError::InvalidUtf8)));
}
