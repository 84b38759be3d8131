//! # decksync-client
//!
//! Realtime client for the shared card-deck server: one websocket transport
//! with reconnect and keepalive, a typed event bus for fan-out, and the
//! [`SessionClient`] handle that ties them together.
//!
//! The client never owns game state. It mirrors the latest server snapshot,
//! republishes it to subscribers, and forwards gameplay intents upstream.

#![deny(unsafe_code)]

pub mod bus;
pub mod config;
pub mod events;
pub mod session;
mod transport;

pub use bus::{Event, EventBus, Subscription};
pub use config::ClientConfig;
pub use events::{ConnectionFailed, ConnectionFailure, ConnectionUpdate, ServerError, StateUpdate};
pub use session::SessionClient;
