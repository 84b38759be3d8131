//! Canonical session events.
//!
//! These are the only events the session publishes. Consumers subscribe via
//! [`SessionClient::subscribe`](crate::SessionClient::subscribe) with the
//! marker type, e.g. `client.subscribe::<StateUpdate>(..)`.

use decksync_core::GameState;

use crate::bus::Event;

/// Full authoritative snapshot. The payload replaces whatever the consumer
/// held before; it is never a delta.
pub struct StateUpdate;

impl Event for StateUpdate {
    type Payload = GameState;
    const NAME: &'static str = "stateUpdate";
}

/// Viewer count, already clamped to at least 1.
pub struct ConnectionUpdate;

impl Event for ConnectionUpdate {
    type Payload = u32;
    const NAME: &'static str = "connectionUpdate";
}

/// Server-reported, user-visible error text, republished verbatim.
pub struct ServerError;

impl Event for ServerError {
    type Payload = String;
    const NAME: &'static str = "error";
}

/// Terminal reconnect failure. Published exactly once per exhausted cycle;
/// only a manual connect starts a new one.
pub struct ConnectionFailed;

impl Event for ConnectionFailed {
    type Payload = ConnectionFailure;
    const NAME: &'static str = "connectionFailed";
}

/// Details carried by [`ConnectionFailed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionFailure {
    /// Consecutive failed attempts before the transport gave up.
    pub attempts: u32,
    /// The last transport error observed, if any.
    pub last_error: Option<String>,
}
