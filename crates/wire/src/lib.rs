// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-socket protocol between the agent and the native host.
//!
//! Wire format: 4-ASCII-digit length prefix (right-justified, zero-padded)
//! followed by that many UTF-8 bytes. The agent is the client and
//! authenticates with the shared secret in its first frame.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod command;
mod frame;
mod notification;

pub use command::{HostCommand, HostEventType, HostReply};
pub use frame::{read_frame, write_frame, WireError, MAX_FRAME_LEN};
pub use notification::HostNotification;

#[cfg(test)]
mod property_tests;
