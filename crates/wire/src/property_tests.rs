// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for the frame codec.

use proptest::prelude::*;

use super::frame::{read_frame, write_frame, WireError};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    #[test]
    fn frames_roundtrip(payload in "[ -~]{0,512}") {
        block_on(async {
            let mut buffer = Vec::new();
            write_frame(&mut buffer, &payload).await.unwrap();
            let mut cursor = std::io::Cursor::new(buffer);
            let back = read_frame(&mut cursor).await.unwrap();
            prop_assert_eq!(back, payload);
            Ok(())
        })?;
    }

    #[test]
    fn consecutive_frames_do_not_bleed(a in "[ -~]{0,64}", b in "[ -~]{0,64}") {
        block_on(async {
            let mut buffer = Vec::new();
            write_frame(&mut buffer, &a).await.unwrap();
            write_frame(&mut buffer, &b).await.unwrap();
            let mut cursor = std::io::Cursor::new(buffer);
            prop_assert_eq!(read_frame(&mut cursor).await.unwrap(), a);
            prop_assert_eq!(read_frame(&mut cursor).await.unwrap(), b);
            Ok(())
        })?;
    }

    #[test]
    fn corrupt_prefix_never_panics(prefix in proptest::array::uniform4(any::<u8>())) {
        block_on(async {
            let mut data = Vec::from(&prefix[..]);
            data.extend_from_slice(&[b'x'; 32]);
            let mut cursor = std::io::Cursor::new(data);
            // Any outcome but a panic is acceptable; digits happen to be valid.
            match read_frame(&mut cursor).await {
                Ok(_) | Err(WireError::BadLengthPrefix(_)) | Err(WireError::ConnectionClosed) => {}
                Err(WireError::InvalidUtf8) => {}
                Err(e) => prop_assert!(false, "unexpected error: {e:?}"),
            }
            Ok(())
        })?;
    }
}
