//! Websocket wire protocol.
//!
//! Every frame is a JSON object tagged by a `type` field. Gameplay intents
//! travel wrapped in a `message` envelope; state flows back as full
//! snapshots. Unknown inbound frames are a decode error for the caller to
//! log and drop, never a reason to tear the connection down.

use serde::{Deserialize, Serialize};

use crate::cards::{Card, GameState};
use crate::errors::ProtocolError;

/// A gameplay intent, as carried inside a [`ClientMessage::Message`]
/// envelope.
///
/// Intents are requests: the server validates and applies them, then
/// broadcasts the resulting snapshot. The client never applies one locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Intent {
    /// Draw the top card.
    Draw,
    /// Shuffle the remaining deck.
    Shuffle,
    /// Reveal cards from the top of the deck.
    Peek,
    /// Discard the most recently drawn card.
    Discard,
    /// Rebuild the deck to its initial composition.
    Reset,
    /// Put peeked cards back onto the deck.
    ReturnPeeked,
    /// Replace the peeked cards with a rearranged list.
    UpdatePeekedCards(PeekedCards),
}

impl Intent {
    /// The wire name of this intent, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draw => "draw",
            Self::Shuffle => "shuffle",
            Self::Peek => "peek",
            Self::Discard => "discard",
            Self::Reset => "reset",
            Self::ReturnPeeked => "returnPeeked",
            Self::UpdatePeekedCards(_) => "updatePeekedCards",
        }
    }

    /// Wrap this intent in its client envelope.
    #[must_use]
    pub fn into_message(self) -> ClientMessage {
        ClientMessage::Message { payload: self }
    }
}

/// Payload for the `updatePeekedCards` intent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeekedCards {
    /// The peeked cards in their rearranged order.
    pub cards: Vec<Card>,
}

/// A frame sent from the client to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Gameplay intent envelope.
    Message {
        /// The wrapped intent.
        payload: Intent,
    },
    /// Initial viewer-count pull, sent as soon as a connection is live.
    GetConnectionCount,
    /// Periodic viewer-count pull.
    RequestConnectionCount,
    /// Keepalive; the server answers with `pong`.
    Ping,
}

impl ClientMessage {
    /// Encode this message as JSON text for the wire.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// A frame received from the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full authoritative snapshot; replaces any cached copy wholesale.
    StateUpdate(GameState),
    /// Viewer-count push or pull response. The count is raw; clamping is the
    /// client's job.
    ConnectionUpdate {
        /// Number of connected viewers as the server sees it.
        connections: u32,
    },
    /// Server-reported, user-visible error.
    Error {
        /// Human-readable message.
        message: String,
    },
    /// Keepalive ack for a [`ClientMessage::Ping`].
    Pong,
}

impl ServerEvent {
    /// Decode a server frame from JSON text.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::Decode)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
