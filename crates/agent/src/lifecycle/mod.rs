// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: cooperative startup, graceful drain, hard stop.
//!
//! One `Deadline` value propagates to every service at shutdown. Each
//! service stops intake immediately, drains up to the deadline, and
//! releases external resources regardless of whether the drain
//! completed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crs_core::{
    Clock, Deadline, EventPayload, Options, OptionsError, PerformanceMetrics, SystemClock,
    VmEvent,
};

use crate::connection::{ping, ConnectionConfig, ConnectionError, ConnectionManager};
use crate::cookie::CookieCodec;
use crate::env;
use crate::host::{HostClient, HostError};
use crate::services::events::EventService;
use crate::services::server_requests::ServerRequestService;
use crate::services::uploads::UploadService;

/// Poll interval of the main-method probe.
const MAIN_METHOD_POLL: Duration = Duration::from_millis(50);

/// Retry policy for event batches.
const BATCH_MAX_RETRIES: u32 = 3;
const BATCH_RETRY_SLEEP: Duration = Duration::from_secs(1);

/// Outer bound on one HTTPS request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Created,
    Starting,
    Running,
    Draining,
    Terminated,
    /// Shut down before authentication completed.
    Discarded,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid lifecycle transition: {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Config(#[from] OptionsError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Shared carrier of the shutdown deadline. Long-running scans read the
/// current deadline on every iteration; while the agent runs it is
/// effectively unbounded.
pub struct ShutdownSignal {
    deadline: Mutex<Option<Deadline>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self { deadline: Mutex::new(None) }
    }

    pub fn current(&self) -> Deadline {
        self.deadline.lock().unwrap_or_else(|| Deadline::unbounded(&SystemClock))
    }

    pub fn arm(&self, deadline: Deadline) {
        *self.deadline.lock() = Some(deadline);
    }

    pub fn armed(&self) -> bool {
        self.deadline.lock().is_some()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LifecycleController {
    state: Mutex<AgentState>,
    clock: SystemClock,
    shutdown_signal: Arc<ShutdownSignal>,
    connection: Arc<ConnectionManager>,
    events: Arc<EventService>,
    uploads: Arc<UploadService>,
    server_requests: Arc<ServerRequestService>,
    ping_token: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    event_workers: usize,
    delay_shutdown: Duration,
}

impl LifecycleController {
    /// Build the pipeline from parsed options. Nothing runs until
    /// `start()`.
    pub fn new(
        options: &Options,
        metrics: Arc<PerformanceMetrics>,
    ) -> Result<Self, LifecycleError> {
        let config = ConnectionConfig {
            api_url: options.api_url.clone(),
            mailbox: options.mailbox.clone(),
            access_key: options.access_key.clone(),
            keystore: options.keystore.clone(),
            client_version: env::AGENT_VERSION.to_string(),
            agent_revision: env::AGENT_REVISION.to_string(),
            request_timeout: REQUEST_TIMEOUT,
        };
        let connection = Arc::new(ConnectionManager::new(config, metrics)?);
        let events = EventService::with_capacity(
            Arc::clone(&connection),
            options.heap_buffer_size.unwrap_or(crate::services::MAX_QUEUE_SIZE),
            BATCH_MAX_RETRIES,
            BATCH_RETRY_SLEEP,
        );
        let uploads = UploadService::new(Arc::clone(&connection));
        let server_requests = ServerRequestService::new(Arc::new(CookieCodec::new()));
        events.attach_server_requests(Arc::clone(&server_requests));

        Ok(Self {
            state: Mutex::new(AgentState::Created),
            clock: SystemClock,
            shutdown_signal: Arc::new(ShutdownSignal::new()),
            connection,
            events,
            uploads,
            server_requests,
            ping_token: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
            event_workers: options.num_concurrent_connections.unwrap_or(1),
            delay_shutdown: options.delay_shutdown,
        })
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock()
    }

    pub fn connection(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.connection)
    }

    pub fn events(&self) -> Arc<EventService> {
        Arc::clone(&self.events)
    }

    pub fn uploads(&self) -> Arc<UploadService> {
        Arc::clone(&self.uploads)
    }

    pub fn server_requests(&self) -> Arc<ServerRequestService> {
        Arc::clone(&self.server_requests)
    }

    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown_signal)
    }

    /// Authenticate and spawn the background workers.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            if *state != AgentState::Created {
                return Err(LifecycleError::InvalidState("start() requires CREATED"));
            }
            *state = AgentState::Starting;
        }

        if let Err(e) = self.connection.start().await {
            error!("[CRS.error] agent disabled: {e}");
            self.connection.report_fatal(&e);
            *self.state.lock() = AgentState::Discarded;
            return Err(e.into());
        }

        {
            let mut workers = self.workers.lock();
            workers.extend(self.events.start(self.event_workers));
            workers.push(self.uploads.start());
            workers.push(self.server_requests.start());
            workers.push(ping::spawn(
                self.connection.ping_client(),
                self.connection.base().to_string(),
                self.ping_token.clone(),
            ));
        }

        *self.state.lock() = AgentState::Running;
        info!("agent running");
        Ok(())
    }

    /// Block startup until the host reports the application's main
    /// method, bounded by both the poll budget and the start deadline.
    pub async fn wait_for_main_method(
        &self,
        host: &HostClient,
        budget: Duration,
    ) -> Option<String> {
        let deadline = Deadline::after(&self.clock, budget);
        loop {
            match host.get_main_method().await {
                Ok(Some(name)) => {
                    info!(name = %name, "main method observed");
                    return Some(name);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "main-method probe failed");
                    return None;
                }
            }
            let Some(wait) = deadline.checked(MAIN_METHOD_POLL) else {
                return None;
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Shutdown with the configured `delayShutdownInternal` budget.
    pub async fn shutdown(&self) -> bool {
        let deadline = Deadline::after(&self.clock, self.delay_shutdown);
        self.shutdown_with(deadline).await
    }

    /// Drain everything against `deadline` and stop. Returns true when
    /// every queue drained before the deadline.
    pub async fn shutdown_with(&self, deadline: Deadline) -> bool {
        {
            let mut state = self.state.lock();
            match *state {
                AgentState::Created | AgentState::Starting => {
                    *state = AgentState::Discarded;
                    return true;
                }
                AgentState::Running => *state = AgentState::Draining,
                AgentState::Draining | AgentState::Terminated | AgentState::Discarded => {
                    return true
                }
            }
        }
        info!("draining agent");
        self.shutdown_signal.arm(deadline);

        // One VM_SHUTDOWN rides ahead of the intake stop.
        if let Some(vm_id) = self.connection.vm_id() {
            self.events.add(VmEvent::new(
                vm_id,
                self.clock.epoch_ms(),
                EventPayload::Shutdown { exit_code: None },
            ));
        }

        self.events.stop(deadline).await;
        self.uploads.stop(deadline).await;
        self.server_requests.stop(deadline).await;
        self.ping_token.cancel();

        let drained = !deadline.expired();
        if !drained {
            warn!("shutdown deadline expired with work remaining");
        }
        *self.state.lock() = AgentState::Terminated;
        info!("agent terminated");
        drained
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
