// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Out-of-band server requests.
//!
//! Control messages ride inside event-batch response bodies as
//! `#requests` sections. Each line is `<kind>|<base64 payload>`; a
//! decoder registered per kind turns the payload into a typed request
//! after the signed cookie validates. A single daemon worker drains the
//! queue and invokes listeners in registration order, without holding
//! any lock across a listener call.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crs_core::Deadline;

use crate::cookie::CookieCodec;
use crate::protocol::{parse_response_sections, EncodedRequest};

/// Poll interval for deadline-bounded waits.
const WAIT_TICK: Duration = Duration::from_millis(50);

/// How much of a jar's entry detail the server wants retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    /// No further interest; retained temp files are deleted.
    None,
    Short,
    Full,
}

impl DetailLevel {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(DetailLevel::None),
            "SHORT" => Some(DetailLevel::Short),
            "FULL" => Some(DetailLevel::Full),
            _ => None,
        }
    }
}

/// A decoded, validated server request. Consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerRequest {
    /// The server wants (or stops wanting) entry details for a jar the
    /// agent announced via a request cookie.
    JarEntries {
        url: String,
        fingerprint: String,
        level: DetailLevel,
    },
    /// Flush buffered diagnostics now.
    Dump { target: String },
}

/// Listener invoked for every dispatched request, in registration order.
pub trait ServerRequestListener: Send + Sync {
    fn on_request(&self, request: &ServerRequest);
}

/// Pure, idempotent payload decoder for one request kind.
pub trait RequestDecoder: Send + Sync {
    fn decode(&self, payload: &str, codec: &CookieCodec) -> Option<ServerRequest>;
}

struct JarEntriesDecoder;

impl RequestDecoder for JarEntriesDecoder {
    fn decode(&self, payload: &str, codec: &CookieCodec) -> Option<ServerRequest> {
        let raw = BASE64.decode(payload).ok()?;
        let text = String::from_utf8(raw).ok()?;
        // `<cookie>|<level>`: the cookie is ours, echoed verbatim; the
        // level is the server's unsigned argument.
        let (cookie, level) = text.rsplit_once('|')?;
        let fields = codec.decode(cookie, 2).ok()?;
        let level = DetailLevel::parse(level)?;
        let mut fields = fields.into_iter();
        Some(ServerRequest::JarEntries {
            url: fields.next()?,
            fingerprint: fields.next()?,
            level,
        })
    }
}

struct DumpDecoder;

impl RequestDecoder for DumpDecoder {
    fn decode(&self, payload: &str, _codec: &CookieCodec) -> Option<ServerRequest> {
        let raw = BASE64.decode(payload).ok()?;
        let target = String::from_utf8(raw).ok()?;
        Some(ServerRequest::Dump { target })
    }
}

pub struct ServerRequestService {
    codec: Arc<CookieCodec>,
    decoders: Mutex<BTreeMap<String, Arc<dyn RequestDecoder>>>,
    listeners: Mutex<Vec<Arc<dyn ServerRequestListener>>>,
    queue: Mutex<VecDeque<ServerRequest>>,
    queued: Notify,
    idle: Notify,
    inflight: AtomicI64,
    accepting: AtomicBool,
    shutdown: CancellationToken,
}

impl ServerRequestService {
    pub fn new(codec: Arc<CookieCodec>) -> Arc<Self> {
        let service = Self {
            codec,
            decoders: Mutex::new(BTreeMap::new()),
            listeners: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            queued: Notify::new(),
            idle: Notify::new(),
            inflight: AtomicI64::new(0),
            accepting: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
        };
        service.register_decoder("jarEntries", Arc::new(JarEntriesDecoder));
        service.register_decoder("dump", Arc::new(DumpDecoder));
        Arc::new(service)
    }

    /// The session cookie codec; producers encode request cookies with
    /// the same key this service validates against.
    pub fn codec(&self) -> Arc<CookieCodec> {
        Arc::clone(&self.codec)
    }

    pub fn register_decoder(&self, kind: &str, decoder: Arc<dyn RequestDecoder>) {
        self.decoders.lock().insert(kind.to_string(), decoder);
    }

    pub fn register_listener(&self, listener: Arc<dyn ServerRequestListener>) {
        self.listeners.lock().push(listener);
    }

    /// Spawn the daemon dispatch worker.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(service.worker_loop())
    }

    /// Extract and enqueue the requests embedded in one response body.
    pub fn enqueue_response_body(&self, body: &str) {
        if !self.accepting.load(Ordering::Acquire) {
            return;
        }
        for encoded in parse_response_sections(body).requests {
            match self.decode(&encoded) {
                Some(request) => {
                    self.inflight.fetch_add(1, Ordering::AcqRel);
                    self.queue.lock().push_back(request);
                    self.queued.notify_one();
                }
                None => warn!(kind = %encoded.kind, "rejected server request"),
            }
        }
    }

    fn decode(&self, encoded: &EncodedRequest) -> Option<ServerRequest> {
        let decoder = self.decoders.lock().get(&encoded.kind).cloned();
        match decoder {
            Some(decoder) => decoder.decode(&encoded.payload, &self.codec),
            None => {
                debug!(kind = %encoded.kind, "no decoder for request kind");
                None
            }
        }
    }

    pub fn inflight(&self) -> i64 {
        self.inflight.load(Ordering::Acquire)
    }

    /// Block until all dispatched work completes or the deadline expires.
    pub async fn wait_all_requests_processed(&self, deadline: Deadline) -> bool {
        loop {
            if self.inflight() == 0 {
                return true;
            }
            let Some(wait) = deadline.checked(WAIT_TICK) else {
                return false;
            };
            let _ = tokio::time::timeout(wait, self.idle.notified()).await;
        }
    }

    pub async fn stop(&self, deadline: Deadline) {
        self.accepting.store(false, Ordering::Release);
        self.wait_all_requests_processed(deadline).await;
        self.shutdown.cancel();
        self.queued.notify_waiters();
        let leftover = {
            let mut queue = self.queue.lock();
            let leftover = queue.len();
            queue.clear();
            leftover
        };
        if leftover > 0 {
            warn!(count = leftover, "deadline expired, dropping server requests");
            self.inflight.fetch_sub(leftover as i64, Ordering::AcqRel);
        }
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let popped = self.queue.lock().pop_front();
            let request = match popped {
                Some(request) => request,
                None => {
                    if self.shutdown.is_cancelled() {
                        break;
                    }
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {}
                        _ = self.queued.notified() => {}
                    }
                    continue;
                }
            };

            let listeners: Vec<Arc<dyn ServerRequestListener>> =
                self.listeners.lock().clone();
            for listener in listeners {
                listener.on_request(&request);
            }

            self.inflight.fetch_sub(1, Ordering::AcqRel);
            if self.inflight() == 0 {
                self.idle.notify_waiters();
            }
        }
        debug!("server request worker stopped");
    }
}

#[cfg(test)]
#[path = "server_requests_tests.rs"]
mod tests;
