//! Connection lifecycle state for a realtime session.

use serde::{Deserialize, Serialize};

/// Lifecycle states of the session's one logical connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No connection, and none being attempted.
    #[default]
    Disconnected,
    /// A connect or reconnect attempt is in flight.
    Connecting,
    /// The connection is live.
    Connected,
    /// Reconnect attempts are exhausted; only a manual connect leaves this.
    Failed,
}

impl ConnectionStatus {
    /// Whether messages can currently be sent.
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Snapshot of the session's connection book-keeping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    /// Current lifecycle status.
    pub status: ConnectionStatus,
    /// Last viewer count received, already clamped to at least 1.
    pub active_connections: u32,
    /// Reconnect attempts made since the last successful connect.
    pub reconnect_attempt: u32,
    /// Most recent connection or server error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
