//! Websocket transport.
//!
//! One [`Transport`] owns one logical connection. A background task runs the
//! connect/reconnect cycle: exponential backoff between attempts, keepalive
//! pings while live, and a terminal failure event once the attempt budget is
//! spent. Outbound messages are fire-and-forget; when no connection is live
//! they are dropped, never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use decksync_core::ReconnectPolicy;
use decksync_core::protocol::{ClientMessage, ServerEvent};

use crate::config::ClientConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle and inbound traffic, as observed by the session.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// A connect attempt is starting. `attempt` is zero for a fresh connect
    /// and counts reconnects since the last successful connection.
    Connecting { attempt: u32 },
    /// The websocket handshake completed.
    Opened,
    /// A decoded server frame arrived.
    Message(ServerEvent),
    /// The connection dropped or a connect attempt failed.
    Closed { reason: Option<String> },
    /// The reconnect budget is spent. Sent exactly once per cycle; the task
    /// exits afterwards and only a new `open` starts another cycle.
    Failed {
        attempts: u32,
        last_error: Option<String>,
    },
}

enum DriveOutcome {
    Closed(Option<String>),
    Cancelled,
}

/// Owner of the websocket connection task.
pub(crate) struct Transport {
    url: String,
    policy: ReconnectPolicy,
    keepalive: Duration,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: Mutex<mpsc::UnboundedSender<String>>,
    connected: Arc<AtomicBool>,
    emitted: AtomicU64,
    dropped: AtomicU64,
    cancel: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    pub(crate) fn new(
        config: &ClientConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        // A zero interval would make tokio's timer panic.
        let keepalive = config.keepalive_interval().max(Duration::from_millis(1));
        let (orphan_tx, _) = mpsc::unbounded_channel();
        Self {
            url: config.url.clone(),
            policy: config.reconnect.clone(),
            keepalive,
            connect_timeout: config.connect_timeout(),
            events,
            outbound: Mutex::new(orphan_tx),
            connected: Arc::new(AtomicBool::new(false)),
            emitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            cancel: Mutex::new(CancellationToken::new()),
            task: Mutex::new(None),
        }
    }

    /// Start the connection cycle unless one is already running.
    ///
    /// Reopening after a close or a terminal failure starts a fresh cycle
    /// with the attempt counter back at zero.
    pub(crate) fn open(&self) {
        let mut task = self.task.lock();
        if let Some(handle) = task.as_ref() {
            let stale = handle.is_finished() || self.cancel.lock().is_cancelled();
            if !stale {
                debug!("transport already open");
                return;
            }
            handle.abort();
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *self.outbound.lock() = outbound_tx;
        let cancel = CancellationToken::new();
        *self.cancel.lock() = cancel.clone();

        let runner = ConnectionRunner {
            url: self.url.clone(),
            policy: self.policy.clone(),
            keepalive: self.keepalive,
            connect_timeout: self.connect_timeout,
            events: self.events.clone(),
            connected: Arc::clone(&self.connected),
        };
        *task = Some(tokio::spawn(runner.run(outbound_rx, cancel)));
    }

    /// Tear the connection down and cancel any pending reconnect.
    pub(crate) fn close(&self) {
        self.cancel.lock().cancel();
        self.connected.store(false, Ordering::Relaxed);
    }

    /// Hand `message` to the socket.
    ///
    /// Returns `false` without side effects on the wire when no connection
    /// is live; the message is dropped, never queued for later.
    pub(crate) fn emit(&self, message: &ClientMessage) -> bool {
        if !self.connected.load(Ordering::Relaxed) {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("emit while disconnected; message dropped");
            return false;
        }
        let text = match message.encode() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to encode outbound message");
                return false;
            }
        };
        if self.outbound.lock().send(text).is_err() {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("connection task is gone; message dropped");
            return false;
        }
        let _ = self.emitted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Messages handed to the socket since construction. Keepalive pings are
    /// transport-internal and not counted.
    pub(crate) fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Messages dropped because no connection was live.
    pub(crate) fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.cancel.lock().cancel();
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

struct ConnectionRunner {
    url: String,
    policy: ReconnectPolicy,
    keepalive: Duration,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
}

impl ConnectionRunner {
    async fn run(
        self,
        mut outbound: mpsc::UnboundedReceiver<String>,
        cancel: CancellationToken,
    ) {
        let mut attempt: u32 = 0;
        let mut last_error: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let _ = self.events.send(TransportEvent::Connecting { attempt });
            debug!(url = %self.url, attempt, "connecting");

            let handshake = tokio::select! {
                () = cancel.cancelled() => break,
                result = timeout(self.connect_timeout, connect_async(self.url.as_str())) => result,
            };

            match handshake {
                Ok(Ok((ws, _response))) => {
                    attempt = 0;
                    self.connected.store(true, Ordering::Relaxed);
                    let _ = self.events.send(TransportEvent::Opened);
                    info!(url = %self.url, "websocket connected");

                    let outcome = self.drive(ws, &mut outbound, &cancel).await;
                    self.connected.store(false, Ordering::Relaxed);
                    match outcome {
                        DriveOutcome::Cancelled => break,
                        DriveOutcome::Closed(reason) => {
                            if let Some(reason) = &reason {
                                warn!(reason = %reason, "websocket closed");
                            } else {
                                info!("websocket closed");
                            }
                            last_error.clone_from(&reason);
                            let _ = self.events.send(TransportEvent::Closed { reason });
                        }
                    }
                }
                Ok(Err(err)) => {
                    let reason = err.to_string();
                    warn!(error = %reason, "websocket connect failed");
                    last_error = Some(reason.clone());
                    let _ = self.events.send(TransportEvent::Closed { reason: Some(reason) });
                }
                Err(_) => {
                    let reason = format!("connect timed out after {:?}", self.connect_timeout);
                    warn!("{reason}");
                    last_error = Some(reason.clone());
                    let _ = self.events.send(TransportEvent::Closed { reason: Some(reason) });
                }
            }

            if attempt >= self.policy.max_attempts {
                warn!(attempts = attempt, "reconnect attempts exhausted; giving up");
                let _ = self.events.send(TransportEvent::Failed {
                    attempts: attempt,
                    last_error: last_error.clone(),
                });
                break;
            }

            let delay = self.policy.backoff_delay(attempt);
            attempt += 1;
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            debug!(attempt, delay_ms, "reconnect scheduled");
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn drive(
        &self,
        ws: WsStream,
        outbound: &mut mpsc::UnboundedReceiver<String>,
        cancel: &CancellationToken,
    ) -> DriveOutcome {
        let (mut ws_tx, mut ws_rx) = ws.split();
        let mut ping_timer = tokio::time::interval(self.keepalive);
        ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a fresh interval fires immediately; push it out
        // one full period so pings start on the configured cadence.
        ping_timer.reset();
        let mut last_pong = tokio::time::Instant::now();

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return DriveOutcome::Cancelled;
                }
                maybe_text = outbound.recv() => {
                    match maybe_text {
                        Some(text) => {
                            if let Err(err) = ws_tx.send(Message::text(text)).await {
                                return DriveOutcome::Closed(Some(err.to_string()));
                            }
                        }
                        // Every handle is gone; nothing left to send, ever.
                        None => return DriveOutcome::Cancelled,
                    }
                }
                _ = ping_timer.tick() => {
                    if last_pong.elapsed() >= self.keepalive * 2 {
                        return DriveOutcome::Closed(Some("keepalive timed out".to_string()));
                    }
                    match ClientMessage::Ping.encode() {
                        Ok(text) => {
                            if let Err(err) = ws_tx.send(Message::text(text)).await {
                                return DriveOutcome::Closed(Some(err.to_string()));
                            }
                            debug!("keepalive ping sent");
                        }
                        Err(err) => warn!(error = %err, "failed to encode keepalive ping"),
                    }
                }
                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => match ServerEvent::decode(text.as_str()) {
                            Ok(ServerEvent::Pong) => {
                                last_pong = tokio::time::Instant::now();
                                debug!("keepalive pong received");
                            }
                            Ok(event) => {
                                let _ = self.events.send(TransportEvent::Message(event));
                            }
                            Err(err) => warn!(error = %err, "dropping undecodable frame"),
                        },
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(err) = ws_tx.send(Message::Pong(data)).await {
                                return DriveOutcome::Closed(Some(err.to_string()));
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            last_pong = tokio::time::Instant::now();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame.map(|frame| frame.reason.to_string());
                            return DriveOutcome::Closed(reason);
                        }
                        Some(Ok(Message::Binary(_) | Message::Frame(_))) => {
                            debug!("ignoring non-text frame");
                        }
                        Some(Err(err)) => return DriveOutcome::Closed(Some(err.to_string())),
                        None => return DriveOutcome::Closed(None),
                    }
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
