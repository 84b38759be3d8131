//! # decksync-core
//!
//! Foundation types for the deck session client: the card and game-state
//! data model, the websocket wire protocol, connection lifecycle states,
//! and the reconnect backoff policy.

#![deny(unsafe_code)]

pub mod cards;
pub mod connection;
pub mod errors;
pub mod protocol;
pub mod retry;

pub use cards::{ActionKind, Card, GameState, LastAction};
pub use connection::{ConnectionState, ConnectionStatus};
pub use errors::ProtocolError;
pub use protocol::{ClientMessage, Intent, PeekedCards, ServerEvent};
pub use retry::ReconnectPolicy;
