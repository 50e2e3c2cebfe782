// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for monitor tests: services wired to an unreachable
//! endpoint, with no workers running, so queues can be inspected.

use std::sync::Arc;
use std::time::Duration;

use crate::connection::{ConnectionConfig, ConnectionManager};
use crate::services::events::EventService;
use crate::services::uploads::UploadService;
use crs_core::PerformanceMetrics;

pub(crate) fn test_connection() -> Arc<ConnectionManager> {
    let config = ConnectionConfig {
        api_url: "https://unreachable.invalid".into(),
        mailbox: "m".into(),
        access_key: None,
        keystore: None,
        client_version: "1.0".into(),
        agent_revision: "rev".into(),
        request_timeout: Duration::from_secs(1),
    };
    Arc::new(ConnectionManager::new(config, Arc::new(PerformanceMetrics::new())).unwrap())
}

pub(crate) fn test_events() -> Arc<EventService> {
    EventService::new(test_connection(), 0, Duration::from_millis(1))
}

pub(crate) fn test_uploads() -> Arc<UploadService> {
    UploadService::new(test_connection())
}
