// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single authority for HTTPS requests to the CRS service.
//!
//! Owns authentication, token refresh, TLS trust, keep-alive, and
//! request accounting. No lock is held across an HTTPS call; the
//! token/vmId pair is written only here and read as a snapshot.

mod batch;
pub mod ping;
mod retry;

pub use batch::{fragment_events, Fragment, FragmentPlan, MAX_REQUEST_BYTES};
pub use retry::request_with_retries;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONNECTION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crs_core::{PerformanceMetrics, VmArtifactChunk, VmEvent};

/// A 401 may be answered by at most one token refresh per window.
pub const TOKEN_REFRESH_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Errors from the connection layer.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connect/read failures and timeouts; retryable.
    #[error("network failure: {0}")]
    Network(String),

    /// 5xx from the server; retryable.
    #[error("server error status {0}")]
    Server(u16),

    /// 401 not resolvable by refresh; fatal.
    #[error("authentication failed")]
    AuthFailed,

    /// 426; the agent is too old for the server. Fatal.
    #[error("client upgrade required")]
    UpgradeRequired,

    /// Response not parseable or unexpected status; fatal.
    #[error("protocol failure: {0}")]
    Protocol(String),

    #[error("trust store unusable: {0}")]
    TrustStore(String),
}

impl ConnectionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectionError::Network(_) | ConnectionError::Server(_))
    }

    /// Fatal errors cooperate with the lifecycle controller to disable
    /// the agent.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConnectionError::AuthFailed
                | ConnectionError::UpgradeRequired
                | ConnectionError::Protocol(_)
        )
    }
}

/// Observer of connection lifecycle transitions.
pub trait ConnectionListener: Send + Sync {
    fn authenticated(&self, vm_id: &str);
    fn fatal(&self, cause: &ConnectionError);
}

/// Streams the PUT body of an artifact chunk and releases external
/// resources once the transfer finishes either way.
#[async_trait]
pub trait ChunkWriter: Send + Sync {
    async fn body(&self) -> std::io::Result<reqwest::Body>;
    async fn complete(&self, success: bool);
}

/// Connection configuration distilled from the agent options.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub api_url: String,
    pub mailbox: String,
    pub access_key: Option<String>,
    pub keystore: Option<PathBuf>,
    pub client_version: String,
    pub agent_revision: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
struct AuthState {
    token: String,
    vm_id: String,
}

pub struct ConnectionManager {
    config: ConnectionConfig,
    /// Primary client: bundled trust anchors plus system defaults.
    client: reqwest::Client,
    /// Upload client: the broader anchor set used for presigned PUTs.
    upload_client: reqwest::Client,
    version_header: String,
    auth: Mutex<Option<AuthState>>,
    last_refresh: Mutex<Option<Instant>>,
    listener: Mutex<Option<Arc<dyn ConnectionListener>>>,
    metrics: Arc<PerformanceMetrics>,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        metrics: Arc<PerformanceMetrics>,
    ) -> Result<Self, ConnectionError> {
        let client = build_client(config.keystore.as_deref(), config.request_timeout)?;
        // The upload endpoint presents a standard web-PKI certificate, so
        // the broader set is the system anchors plus the bundled ones.
        let upload_client = build_client(config.keystore.as_deref(), config.request_timeout)?;
        let version_header =
            format!("{}+{}", config.client_version, config.agent_revision);
        Ok(Self {
            config,
            client,
            upload_client,
            version_header,
            auth: Mutex::new(None),
            last_refresh: Mutex::new(None),
            listener: Mutex::new(None),
            metrics,
        })
    }

    pub fn set_listener(&self, listener: Arc<dyn ConnectionListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    /// Server-assigned VM id, once authenticated.
    pub fn vm_id(&self) -> Option<String> {
        self.auth.lock().as_ref().map(|a| a.vm_id.clone())
    }

    /// Report a fatal cause to the registered listener.
    pub fn report_fatal(&self, cause: &ConnectionError) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener.fatal(cause);
        }
    }

    /// Acquire the initial runtime token.
    pub async fn start(&self) -> Result<(), ConnectionError> {
        let url = format!(
            "{}/crs/auth/rt/token?clientVersion={}&mailbox={}",
            self.base(),
            self.config.client_version,
            self.config.mailbox
        );
        let mut request = self.client.get(&url).header(ACCEPT, "text/plain");
        if let Some(key) = &self.config.access_key {
            request = request.header("x-api-key", key);
        }

        self.metrics.request();
        let response = request.send().await.map_err(network)?;
        let status = response.status();
        let text = response.text().await.map_err(network)?;
        let (token, vm_id) = match status {
            s if s.is_success() => parse_pair(&text)?,
            StatusCode::UPGRADE_REQUIRED => return Err(ConnectionError::UpgradeRequired),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ConnectionError::AuthFailed)
            }
            s if s.is_server_error() => return Err(ConnectionError::Server(s.as_u16())),
            s => return Err(ConnectionError::Protocol(format!("token status {s}"))),
        };

        info!(vm_id = %vm_id, "authenticated with CRS service");
        self.metrics.handshake();
        *self.auth.lock() = Some(AuthState { token, vm_id: vm_id.clone() });

        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener.authenticated(&vm_id);
        }
        Ok(())
    }

    /// POST an event batch, fragmented at `MAX_REQUEST_BYTES`. Stops at
    /// the first failed fragment; fragments already sent are not re-sent
    /// on this call (the server deduplicates by eventId on later
    /// retries). Returns the response bodies, which may carry embedded
    /// server requests.
    pub async fn send_event_batch(
        &self,
        events: &[VmEvent],
    ) -> Result<Vec<String>, ConnectionError> {
        let vm_id = self
            .vm_id()
            .ok_or_else(|| ConnectionError::Protocol("not authenticated".into()))?;
        let plan = fragment_events(events);
        for (event_type, prefix) in &plan.dropped {
            warn!(?event_type, prefix = %prefix, "event exceeds request limit, dropped");
            self.metrics.event_dropped();
        }

        let path = format!("/crs/instance/{vm_id}");
        let mut bodies = Vec::with_capacity(plan.fragments.len());
        for fragment in &plan.fragments {
            let body = self
                .authed_text(Method::POST, &path, Some(fragment.body.clone()), false)
                .await?;
            self.metrics
                .events_sent(fragment.count as u64, fragment.body.len() as u64);
            bodies.push(body);
        }
        Ok(bodies)
    }

    /// POST chunk metadata; on 2xx the response is the presigned URL and
    /// storage key, then the writer's bytes are PUT to the URL through
    /// the upload client.
    pub async fn send_artifact_chunk(
        &self,
        chunk: &VmArtifactChunk,
        writer: &dyn ChunkWriter,
    ) -> Result<String, ConnectionError> {
        let body = serde_json::to_string(chunk)
            .map_err(|e| ConnectionError::Protocol(format!("chunk serialization: {e}")))?;
        let text = self
            .authed_text(Method::POST, "/crs/artifact/chunk", Some(body), false)
            .await?;
        let (location, storage_key) = parse_pair(&text)?;

        let put_body = writer.body().await.map_err(|e| network_io(&e))?;
        let response = self
            .upload_client
            .put(&location)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(put_body)
            .send()
            .await
            .map_err(network)?;
        let status = response.status();
        if status.is_server_error() {
            return Err(ConnectionError::Server(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ConnectionError::Protocol(format!("presigned PUT status {status}")));
        }
        debug!(storage_key = %storage_key, "artifact chunk uploaded");
        Ok(storage_key)
    }

    /// PATCH the VM instance, tunneled as POST + `X-HTTP-Method-Override`.
    pub async fn patch_instance(
        &self,
        patch: &serde_json::Value,
    ) -> Result<(), ConnectionError> {
        let vm_id = self
            .vm_id()
            .ok_or_else(|| ConnectionError::Protocol("not authenticated".into()))?;
        let path = format!("/crs/instance/{vm_id}");
        self.authed_text(Method::POST, &path, Some(patch.to_string()), true)
            .await
            .map(|_| ())
    }

    /// The client used for keep-alive pings.
    pub(crate) fn ping_client(&self) -> reqwest::Client {
        self.client.clone()
    }

    pub(crate) fn base(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    /// Authenticated request returning the response text. A 401 within
    /// the refresh window triggers one token refresh and one replay.
    async fn authed_text(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        tunnel_patch: bool,
    ) -> Result<String, ConnectionError> {
        let mut replayed = false;
        loop {
            let token = self
                .auth
                .lock()
                .as_ref()
                .map(|a| a.token.clone())
                .ok_or_else(|| ConnectionError::Protocol("not authenticated".into()))?;

            let url = format!("{}{}", self.base(), path);
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .header("x-agent-version", &self.version_header)
                .header(ACCEPT, "text/plain")
                .header(CONNECTION, "keep-alive");
            if tunnel_patch {
                request = request.header("X-HTTP-Method-Override", "PATCH");
            }
            if let Some(body) = &body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
            }

            self.metrics.request();
            let response = request.send().await.map_err(network)?;
            let status = response.status();
            match status {
                s if s.is_success() => return response.text().await.map_err(network),
                StatusCode::UNAUTHORIZED => {
                    if !replayed && self.refresh_token().await? {
                        replayed = true;
                        continue;
                    }
                    return Err(ConnectionError::AuthFailed);
                }
                StatusCode::UPGRADE_REQUIRED => return Err(ConnectionError::UpgradeRequired),
                s if s.is_server_error() => return Err(ConnectionError::Server(s.as_u16())),
                s => return Err(ConnectionError::Protocol(format!("status {s}"))),
            }
        }
    }

    /// Refresh the runtime token with the old one as the request body.
    /// Returns false without refreshing when the last refresh is still
    /// inside the window.
    async fn refresh_token(&self) -> Result<bool, ConnectionError> {
        {
            let last = self.last_refresh.lock();
            if let Some(at) = *last {
                if at.elapsed() < TOKEN_REFRESH_WINDOW {
                    debug!("401 inside refresh window, not refreshing again");
                    return Ok(false);
                }
            }
        }

        let old_token = self
            .auth
            .lock()
            .as_ref()
            .map(|a| a.token.clone())
            .ok_or(ConnectionError::AuthFailed)?;

        let url = format!("{}/crs/auth/rt/token", self.base());
        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/plain")
            .header(ACCEPT, "text/plain")
            .body(old_token);
        if let Some(key) = &self.config.access_key {
            request = request.header("x-api-key", key);
        }

        self.metrics.request();
        let response = request.send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, "token refresh rejected");
            return Err(ConnectionError::AuthFailed);
        }
        let text = response.text().await.map_err(network)?;
        let (token, vm_id) = parse_pair(&text)?;

        *self.auth.lock() = Some(AuthState { token, vm_id });
        *self.last_refresh.lock() = Some(Instant::now());
        self.metrics.handshake();
        info!("runtime token refreshed");
        Ok(true)
    }
}

fn build_client(
    keystore: Option<&Path>,
    timeout: Duration,
) -> Result<reqwest::Client, ConnectionError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .tls_built_in_root_certs(true)
        .tcp_keepalive(Some(Duration::from_secs(2)))
        .pool_idle_timeout(Duration::from_secs(4))
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout);

    if let Some(path) = keystore {
        let pem = std::fs::read(path)
            .map_err(|e| ConnectionError::TrustStore(format!("{}: {e}", path.display())))?;
        let certs = reqwest::Certificate::from_pem_bundle(&pem)
            .map_err(|e| ConnectionError::TrustStore(format!("{}: {e}", path.display())))?;
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }

    builder
        .build()
        .map_err(|e| ConnectionError::TrustStore(e.to_string()))
}

/// Parse a two-line `<first>\n<second>` response body.
fn parse_pair(text: &str) -> Result<(String, String), ConnectionError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some(first), Some(second)) => Ok((first.to_string(), second.to_string())),
        _ => Err(ConnectionError::Protocol(format!(
            "expected two lines, got {:?}",
            text.get(..100.min(text.len()))
        ))),
    }
}

fn network(e: reqwest::Error) -> ConnectionError {
    ConnectionError::Network(e.to_string())
}

fn network_io(e: &std::io::Error) -> ConnectionError {
    ConnectionError::Network(e.to_string())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
