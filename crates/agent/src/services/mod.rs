// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background services of the agent pipeline.
//!
//! Each service runs an independent worker draining a bounded queue and
//! honors the shutdown deadline on every wait.

pub mod events;
pub mod server_requests;
pub mod uploads;

pub use events::{EventService, MAX_QUEUE_SIZE};
pub use server_requests::{
    DetailLevel, RequestDecoder, ServerRequest, ServerRequestListener, ServerRequestService,
};
pub use uploads::{BytesChunkWriter, FileChunkWriter, UploadService};
