//! The session client.
//!
//! [`SessionClient`] is an explicit, cloneable handle: it owns one
//! [`Transport`], one [`EventBus`], and a small book-keeping state machine.
//! A background pump routes transport events into bus publications and runs
//! the periodic viewer-count poll while the session is connected. There is
//! no global instance; anything that needs the session gets a clone of the
//! handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use decksync_core::protocol::{ClientMessage, Intent, ServerEvent};
use decksync_core::{ConnectionState, ConnectionStatus, GameState};

use crate::bus::{Event, EventBus, Subscription};
use crate::config::ClientConfig;
use crate::events::{
    ConnectionFailed, ConnectionFailure, ConnectionUpdate, ServerError, StateUpdate,
};
use crate::transport::{Transport, TransportEvent};

/// Handle to one realtime deck session.
///
/// Clones share the same connection, bus, and state. Dropping the last
/// handle tears the connection down and stops the background pump.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    bus: EventBus,
    transport: Transport,
    /// Whether the user currently wants a connection. Cleared by
    /// `disconnect` so late events from a cancelled connection task cannot
    /// resurrect the state machine.
    wanted: AtomicBool,
    state: Mutex<ConnectionState>,
    mirror: Mutex<Option<GameState>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionClient {
    /// Create a client for `config`. No connection is made until
    /// [`connect`](Self::connect) is called.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        // A zero interval would make tokio's timer panic.
        let poll_interval = config.poll_interval().max(Duration::from_millis(1));
        let inner = Arc::new(SessionInner {
            bus: EventBus::new(),
            transport: Transport::new(&config, events_tx),
            wanted: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::default()),
            mirror: Mutex::new(None),
            pump: Mutex::new(None),
        });
        let pump = tokio::spawn(run_pump(events_rx, Arc::downgrade(&inner), poll_interval));
        *inner.pump.lock() = Some(pump);
        Self { inner }
    }

    /// Open the connection unless one is already open.
    ///
    /// Also the only way out of the failed state after the reconnect budget
    /// was spent.
    pub fn connect(&self) {
        self.inner.wanted.store(true, Ordering::Relaxed);
        self.inner.transport.open();
    }

    /// Tear the connection down.
    ///
    /// The connection task is cancelled along with its keepalive and
    /// backoff timers; the viewer-count poll parks until the next
    /// [`connect`](Self::connect).
    pub fn disconnect(&self) {
        self.inner.wanted.store(false, Ordering::Relaxed);
        self.inner.transport.close();
        let mut state = self.inner.state.lock();
        state.status = ConnectionStatus::Disconnected;
        state.reconnect_attempt = 0;
        info!("session disconnected by request");
    }

    /// Send a gameplay intent to the server.
    ///
    /// Fire-and-forget: there is no acknowledgement beyond the next state
    /// snapshot. When the session is not connected the intent is dropped,
    /// never queued, and a single reconnect is started as recovery.
    pub fn send(&self, intent: Intent) {
        if !self.inner.state.lock().status.is_connected() {
            warn!(
                intent = intent.name(),
                "send while disconnected; dropping intent and reconnecting"
            );
            self.connect();
            return;
        }
        let _ = self.inner.transport.emit(&intent.into_message());
    }

    /// Register `callback` for a session event. See [`crate::events`] for
    /// the available markers.
    pub fn subscribe<E: Event>(
        &self,
        callback: impl FnMut(&E::Payload) + Send + 'static,
    ) -> Subscription {
        self.inner.bus.subscribe::<E>(callback)
    }

    /// Snapshot of the connection book-keeping.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().clone()
    }

    /// The last game snapshot received, if any.
    #[must_use]
    pub fn latest_state(&self) -> Option<GameState> {
        self.inner.mirror.lock().clone()
    }

    /// Messages handed to the socket since the client was created.
    #[must_use]
    pub fn emitted_messages(&self) -> u64 {
        self.inner.transport.emitted_count()
    }

    /// Messages dropped at the socket because no connection was live.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.inner.transport.dropped_count()
    }
}

impl SessionInner {
    fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connecting { attempt } => {
                let mut state = self.state.lock();
                state.status = ConnectionStatus::Connecting;
                state.reconnect_attempt = attempt;
            }
            TransportEvent::Opened => {
                {
                    let mut state = self.state.lock();
                    state.status = ConnectionStatus::Connected;
                    state.reconnect_attempt = 0;
                    state.last_error = None;
                }
                // Pull the viewer count right away instead of waiting for
                // the first poll tick.
                let _ = self.transport.emit(&ClientMessage::GetConnectionCount);
            }
            TransportEvent::Message(event) => self.handle_server_event(event),
            TransportEvent::Closed { reason } => {
                let mut state = self.state.lock();
                state.status = ConnectionStatus::Disconnected;
                if reason.is_some() {
                    state.last_error = reason;
                }
            }
            TransportEvent::Failed { attempts, last_error } => {
                {
                    let mut state = self.state.lock();
                    state.status = ConnectionStatus::Failed;
                    state.reconnect_attempt = attempts;
                    state.last_error.clone_from(&last_error);
                }
                self.bus
                    .publish::<ConnectionFailed>(&ConnectionFailure { attempts, last_error });
            }
        }
    }

    fn handle_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::StateUpdate(snapshot) => {
                // The snapshot replaces the mirror wholesale; nothing is
                // merged field-by-field.
                *self.mirror.lock() = Some(snapshot.clone());
                self.bus.publish::<StateUpdate>(&snapshot);
            }
            ServerEvent::ConnectionUpdate { connections } => {
                // This client is itself connected, so the count shown is
                // never below one.
                let clamped = connections.max(1);
                self.state.lock().active_connections = clamped;
                self.bus.publish::<ConnectionUpdate>(&clamped);
            }
            ServerEvent::Error { message } => {
                warn!(message = %message, "server reported an error");
                self.state.lock().last_error = Some(message.clone());
                self.bus.publish::<ServerError>(&message);
            }
            // Keepalive is handled inside the transport; nothing to do here.
            ServerEvent::Pong => {}
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.transport.close();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

async fn run_pump(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    session: Weak<SessionInner>,
    poll_interval: Duration,
) {
    let mut poll_timer = tokio::time::interval(poll_interval);
    poll_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        // The poll branch is parked whenever the session is not connected,
        // and re-armed a full interval after the connection opens. A tick
        // already in flight when the status flips still lands once, so the
        // branch re-checks before emitting.
        let connected = session
            .upgrade()
            .is_some_and(|session| session.state.lock().status.is_connected());
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else { break };
                let Some(session) = session.upgrade() else { break };
                if matches!(event, TransportEvent::Opened) {
                    poll_timer.reset();
                }
                if session.wanted.load(Ordering::Relaxed) {
                    session.handle_transport_event(event);
                } else {
                    debug!("ignoring transport event after disconnect");
                }
            }
            _ = poll_timer.tick(), if connected => {
                let Some(session) = session.upgrade() else { break };
                if session.state.lock().status.is_connected() {
                    let _ = session.transport.emit(&ClientMessage::RequestConnectionCount);
                }
            }
        }
    }
    debug!("session event pump stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
