// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keep-alive ping loop.
//!
//! The server drops idle TLS sessions after 5 seconds; an OPTIONS
//! request every 4 seconds holds the session open between batches.

use std::time::Duration;

use reqwest::Method;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Interval between keep-alive pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(4);

/// Spawn the ping loop; it runs until the token is cancelled.
pub fn spawn(
    client: reqwest::Client,
    base_url: String,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(PING_INTERVAL) => {
                    match client.request(Method::OPTIONS, &base_url).send().await {
                        Ok(response) => debug!(status = %response.status(), "keep-alive ping"),
                        Err(e) => debug!(error = %e, "keep-alive ping failed"),
                    }
                }
            }
        }
        debug!("ping loop stopped");
    })
}
