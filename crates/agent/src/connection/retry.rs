// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry wrapper: at most `max_retries + 1` attempts, a fixed sleep
//! between attempts, and retries only for retryable failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crs_core::PerformanceMetrics;

use super::ConnectionError;

/// Run `op` with retries. Fatal errors abort immediately.
pub async fn request_with_retries<T, F, Fut>(
    name: &str,
    max_retries: u32,
    retry_sleep: Duration,
    metrics: &PerformanceMetrics,
    mut op: F,
) -> Result<T, ConnectionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConnectionError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                metrics.retry();
                debug!(name, attempt, error = %e, "retrying after sleep");
                tokio::time::sleep(retry_sleep).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(name, attempts = attempt + 1, error = %e, "giving up");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
