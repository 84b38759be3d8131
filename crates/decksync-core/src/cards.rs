//! Card and game-state data model.
//!
//! `GameState` is server-authoritative. The client only ever holds it as a
//! cached mirror and replaces the whole value on every snapshot; nothing in
//! this crate mutates a snapshot field-by-field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single card in the deck.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Stable identifier, e.g. `card-7`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Flavor or rules text.
    pub description: String,
    /// URL of the card face image.
    pub image_url: String,
    /// Free-form attributes taken from unrecognized catalog columns.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// The kind of action echoed with each snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// A card moved from the deck to the drawn pile.
    Draw,
    /// A drawn card moved to the discard pile.
    Discard,
    /// Cards were revealed from the top of the deck.
    Peek,
    /// Peeked cards went back onto the deck.
    ReturnPeeked,
    /// The deck was rebuilt to its initial composition.
    Reset,
    /// No action has happened yet; the server sends an empty string.
    #[default]
    #[serde(rename = "")]
    None,
}

/// The last action the server applied, echoed with each snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastAction {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// The card involved, when the action concerns a single card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
}

/// Complete game state as broadcast by the server.
///
/// Every pile is a full list; a snapshot is never a delta.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Cards remaining in the deck.
    pub cards: Vec<Card>,
    /// Cards drawn face-up.
    pub drawn_cards: Vec<Card>,
    /// Discarded cards.
    pub discard_pile: Vec<Card>,
    /// Cards currently revealed by a peek.
    pub peeked_cards: Vec<Card>,
    /// The action that produced this snapshot.
    #[serde(default)]
    pub last_action: LastAction,
}

impl GameState {
    /// Total number of cards across every pile.
    #[must_use]
    pub fn total_cards(&self) -> usize {
        self.cards.len()
            + self.drawn_cards.len()
            + self.discard_pile.len()
            + self.peeked_cards.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
