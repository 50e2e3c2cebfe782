// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for the native host's command socket.
//!
//! One connection carries both directions: commands issued by the agent
//! (replies come back in order) and notifications pushed by the host.
//! A pump task reads every frame and routes replies to their waiting
//! callers and notifications to the lifecycle router. The host does not
//! reconnect; a dropped socket means the agent is shutting down with it.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crs_wire::{
    read_frame, write_frame, HostCommand, HostNotification, HostReply, WireError,
};

use crate::jfr::ChunkRepository;

/// Commands time out rather than hang a draining agent.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Buffered notifications before the pump drops new ones.
const NOTIFICATION_BUFFER: usize = 1_024;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host rejected the shared secret")]
    AuthRejected,

    #[error("host command failed: {0}")]
    Rejected(String),

    #[error("host connection closed")]
    ConnectionClosed,

    #[error("host command timed out")]
    Timeout,

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A connected, authenticated host client plus the notification stream.
pub struct HostConnection {
    pub client: Arc<HostClient>,
    pub notifications: mpsc::Receiver<HostNotification>,
    pub pump: JoinHandle<()>,
}

pub struct HostClient {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Arc<Mutex<VecDeque<oneshot::Sender<HostReply>>>>,
    closed: CancellationToken,
}

impl HostClient {
    /// Connect to the host socket and authenticate with the shared
    /// secret.
    pub async fn connect(path: &Path, secret: &str) -> Result<HostConnection, HostError> {
        let stream = UnixStream::connect(path).await?;
        Self::from_stream(stream, secret).await
    }

    /// Handshake over an established stream (tests use a socket pair).
    pub async fn from_stream(
        stream: UnixStream,
        secret: &str,
    ) -> Result<HostConnection, HostError> {
        let (mut read_half, mut write_half) = stream.into_split();

        write_frame(&mut write_half, secret).await?;
        let reply = read_frame(&mut read_half).await?;
        if HostReply::parse(&reply)? != HostReply::Ok {
            return Err(HostError::AuthRejected);
        }

        let pending: Arc<Mutex<VecDeque<oneshot::Sender<HostReply>>>> =
            Arc::new(Mutex::new(VecDeque::new()));
        let closed = CancellationToken::new();
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_BUFFER);

        let pump = tokio::spawn(pump_loop(
            read_half,
            Arc::clone(&pending),
            notify_tx,
            closed.clone(),
        ));

        let client = Arc::new(HostClient {
            writer: tokio::sync::Mutex::new(write_half),
            pending,
            closed,
        });
        Ok(HostConnection { client, notifications: notify_rx, pump })
    }

    /// Issue one command and await its reply.
    pub async fn command(&self, command: HostCommand) -> Result<HostReply, HostError> {
        if self.closed.is_cancelled() {
            return Err(HostError::ConnectionClosed);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        // Registration precedes the write so in-order replies pair up.
        self.pending.lock().push_back(reply_tx);

        {
            let mut writer = self.writer.lock().await;
            write_frame(&mut *writer, &command.format()).await?;
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(HostError::ConnectionClosed),
            Err(_) => Err(HostError::Timeout),
        }
    }

    /// Command that must simply succeed.
    pub async fn expect_ok(&self, command: HostCommand) -> Result<(), HostError> {
        match self.command(command).await? {
            HostReply::Ok | HostReply::Value(_) => Ok(()),
            HostReply::Error(message) => Err(HostError::Rejected(message)),
        }
    }

    pub async fn get_capabilities(&self) -> Result<Vec<String>, HostError> {
        let reply = self.command(HostCommand::GetCapabilities).await?;
        match reply {
            HostReply::Error(message) => Err(HostError::Rejected(message)),
            reply => Ok(reply.capabilities()),
        }
    }

    /// Poll for the detected main method; `None` until the host saw it.
    pub async fn get_main_method(&self) -> Result<Option<String>, HostError> {
        match self.command(HostCommand::GetMainMethod).await? {
            HostReply::Value(name) if !name.is_empty() => Ok(Some(name)),
            HostReply::Error(message) => Err(HostError::Rejected(message)),
            _ => Ok(None),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl ChunkRepository for HostClient {
    async fn use_chunk(&self, path: &str, in_use: bool) -> bool {
        let command = HostCommand::UseRepositoryChunk { path: path.to_string(), in_use };
        match self.command(command).await {
            Ok(HostReply::Ok) | Ok(HostReply::Value(_)) => true,
            Ok(HostReply::Error(message)) => {
                debug!(path, message = %message, "chunk pin refused");
                false
            }
            Err(e) => {
                debug!(path, error = %e, "chunk pin failed");
                false
            }
        }
    }
}

async fn pump_loop(
    mut reader: OwnedReadHalf,
    pending: Arc<Mutex<VecDeque<oneshot::Sender<HostReply>>>>,
    notifications: mpsc::Sender<HostNotification>,
    closed: CancellationToken,
) {
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(WireError::ConnectionClosed) => break,
            Err(e) => {
                warn!(error = %e, "host frame error, closing");
                break;
            }
        };

        if HostReply::is_reply_frame(&frame) {
            let reply = match HostReply::parse(&frame) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "unparseable host reply");
                    continue;
                }
            };
            match pending.lock().pop_front() {
                Some(sender) => {
                    let _ = sender.send(reply);
                }
                None => warn!("host reply without a pending command"),
            }
            continue;
        }

        match HostNotification::parse(&frame) {
            Ok(notification) => {
                if notifications.try_send(notification).is_err() {
                    warn!("notification buffer full, dropping");
                }
            }
            Err(e) => warn!(error = %e, "unparseable host notification"),
        }
    }
    closed.cancel();
    debug!("host pump stopped");
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
