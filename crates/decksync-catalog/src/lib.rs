//! # decksync-catalog
//!
//! Card catalog loading for the deck simulator. The one production source
//! is a spreadsheet values endpoint: row zero names the columns, every
//! further row is a card. Cards get deterministic placeholder images so each
//! one looks the same on every client without hosting any assets.

#![deny(unsafe_code)]

pub mod errors;
pub mod images;
pub mod sheets;

use async_trait::async_trait;
use decksync_core::Card;

pub use errors::CatalogError;
pub use images::ImageAssigner;
pub use sheets::{CatalogConfig, SheetsCatalog};

/// A source of cards for the deck.
#[async_trait]
pub trait CardSource: Send + Sync {
    /// Fetch the complete card list.
    ///
    /// All or nothing: a failure never yields a partial list, and retrying
    /// is the caller's decision.
    async fn fetch_cards(&self) -> Result<Vec<Card>, CatalogError>;
}
