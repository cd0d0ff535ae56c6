// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reconnecting websocket client with correlated requests.
//!
//! One supervisor task owns the socket. Callers share it through
//! [`VerificationChannel::verify`], which registers a pending entry keyed by
//! correlation id and waits for the matching response.
//!
//! ## Pending entries
//!
//! Every entry is tagged with the generation of the connection it was sent
//! on and a per-call ticket. An entry is removed exactly once, by whichever
//! comes first:
//! - a response with the same correlation id, kind, and generation
//! - the teardown of its connection (fails with [`ChannelError::Closed`])
//! - the caller's timeout or cancellation (drop guard, matched by ticket)
//!
//! Lock order is always `session` before `pending`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::ChannelError;
use super::message::{VerificationRequest, VerificationResponse, DEFAULT_MESSAGE_KIND};
use super::state::ConnectionState;

/// Default delay before reconnecting after a connection ends.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_millis(2000);

/// Default bound on a single verification call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Peer websocket URL (`ws://`).
    pub url: String,
    pub retry_after: Duration,
    pub request_timeout: Duration,
    /// Message kind accepted in responses.
    pub message_kind: String,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry_after: DEFAULT_RETRY_AFTER,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            message_kind: DEFAULT_MESSAGE_KIND.to_string(),
        }
    }
}

type Responder = oneshot::Sender<Result<VerificationResponse, ChannelError>>;

struct Session {
    generation: u64,
    outbound: mpsc::UnboundedSender<Message>,
}

struct Pending {
    generation: u64,
    ticket: u64,
    responder: Responder,
}

struct Shared {
    config: ChannelConfig,
    state: watch::Sender<ConnectionState>,
    session: Mutex<Option<Session>>,
    pending: Mutex<HashMap<String, Pending>>,
    next_ticket: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Fail every pending entry sent on `generation`.
    fn fail_pending(&self, generation: u64) -> usize {
        let mut pending = lock(&self.pending);
        let stale: Vec<String> = pending
            .iter()
            .filter(|(_, entry)| entry.generation == generation)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            if let Some(entry) = pending.remove(id) {
                let _ = entry.responder.send(Err(ChannelError::Closed));
            }
        }
        stale.len()
    }

    fn dispatch(&self, generation: u64, text: &str) {
        let Some(response) = VerificationResponse::parse(text) else {
            warn!(generation, "Dropping unparseable verification message");
            return;
        };

        if response.message_kind != self.config.message_kind {
            warn!(
                kind = %response.message_kind,
                correlation_id = %response.correlation_id,
                "Dropping verification message of unexpected kind"
            );
            return;
        }

        let mut pending = lock(&self.pending);
        let matches = pending
            .get(&response.correlation_id)
            .is_some_and(|entry| entry.generation == generation);
        if !matches {
            debug!(
                correlation_id = %response.correlation_id,
                "Dropping verification response with no pending request"
            );
            return;
        }

        if let Some(entry) = pending.remove(&response.correlation_id) {
            let _ = entry.responder.send(Ok(response));
        }
    }
}

/// Removes the caller's pending entry if it is still registered.
struct PendingGuard<'a> {
    shared: &'a Shared,
    correlation_id: &'a str,
    ticket: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = lock(&self.shared.pending);
        let ours = pending
            .get(self.correlation_id)
            .is_some_and(|entry| entry.ticket == self.ticket);
        if ours {
            pending.remove(self.correlation_id);
        }
    }
}

/// Long-lived verification connection shared by concurrent callers.
pub struct VerificationChannel {
    shared: Arc<Shared>,
    started: AtomicBool,
    shutdown: CancellationToken,
}

impl VerificationChannel {
    /// Create a channel in the `Disconnected` state. No I/O happens until
    /// [`connect`](Self::connect).
    pub fn new(config: ChannelConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                config,
                state,
                session: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(0),
            }),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    /// Start the connection supervisor. Later calls are no-ops.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        info!(url = %self.shared.config.url, "Starting verification channel");
        tokio::spawn(supervise(self.shared.clone(), self.shutdown.clone()));
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the connection is open. Returns false on timeout.
    pub async fn wait_until_open(&self, timeout: Duration) -> bool {
        let mut state = self.subscribe();
        let open = matches!(
            tokio::time::timeout(timeout, state.wait_for(|s| *s == ConnectionState::Open)).await,
            Ok(Ok(_))
        );
        open
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// Send `claim` to the peer and wait for the matching response.
    ///
    /// `timeout` overrides the configured request timeout.
    pub async fn verify(
        &self,
        claim: Value,
        correlation_id: &str,
        timeout: Option<Duration>,
    ) -> Result<VerificationResponse, ChannelError> {
        let timeout = timeout.unwrap_or(self.shared.config.request_timeout);
        let request = VerificationRequest::new(claim, correlation_id);
        let text =
            serde_json::to_string(&request).map_err(|e| ChannelError::Encode(e.to_string()))?;

        let ticket = self.shared.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (responder, response) = oneshot::channel();

        {
            let session = lock(&self.shared.session);
            let session = session.as_ref().ok_or(ChannelError::NotOpen)?;

            let mut pending = lock(&self.shared.pending);
            if pending.contains_key(correlation_id) {
                return Err(ChannelError::DuplicateCorrelation(correlation_id.to_string()));
            }

            session
                .outbound
                .send(Message::text(text))
                .map_err(|_| ChannelError::NotOpen)?;
            pending.insert(
                correlation_id.to_string(),
                Pending {
                    generation: session.generation,
                    ticket,
                    responder,
                },
            );
        }

        let _guard = PendingGuard {
            shared: &self.shared,
            correlation_id,
            ticket,
        };

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => {
                warn!(correlation_id, timeout_ms = timeout.as_millis() as u64, "Verification request timed out");
                Err(ChannelError::Timeout)
            }
        }
    }

    /// Stop the supervisor and close the connection. Pending requests fail
    /// with [`ChannelError::Closed`].
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for VerificationChannel {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for VerificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationChannel")
            .field("url", &self.shared.config.url)
            .field("state", &self.state())
            .finish()
    }
}

async fn supervise(shared: Arc<Shared>, shutdown: CancellationToken) {
    let mut generation = 0u64;

    loop {
        generation += 1;
        shared.set_state(ConnectionState::Connecting);

        let connected = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = tokio_tungstenite::connect_async(shared.config.url.as_str()) => result,
        };

        match connected {
            Ok((socket, _)) => {
                info!(generation, "Verification channel open");
                run_session(&shared, generation, socket, &shutdown).await;
            }
            Err(e) => {
                warn!(url = %shared.config.url, error = %e, "Verification channel connect failed");
            }
        }

        *lock(&shared.session) = None;
        shared.set_state(ConnectionState::Closed);
        let failed = shared.fail_pending(generation);
        if failed > 0 {
            warn!(generation, failed, "Failed pending verification requests");
        }

        if shutdown.is_cancelled() {
            break;
        }
        shared.set_state(ConnectionState::Disconnected);

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(shared.config.retry_after) => {}
        }
    }

    *lock(&shared.session) = None;
    shared.fail_pending(generation);
    shared.set_state(ConnectionState::Closed);
    info!("Verification channel shut down");
}

async fn run_session<S>(
    shared: &Shared,
    generation: u64,
    socket: tokio_tungstenite::WebSocketStream<S>,
    shutdown: &CancellationToken,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut requests) = mpsc::unbounded_channel();

    *lock(&shared.session) = Some(Session {
        generation,
        outbound,
    });
    shared.set_state(ConnectionState::Open);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            Some(message) = requests.recv() => {
                if let Err(e) = sink.send(message).await {
                    warn!(generation, error = %e, "Verification channel send failed");
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => shared.dispatch(generation, text.as_str()),
                Some(Ok(Message::Close(_))) | None => {
                    info!(generation, "Verification channel closed by peer");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(generation, error = %e, "Verification channel read failed");
                    break;
                }
            },
        }
    }
}
