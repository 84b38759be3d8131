//! Spreadsheet-backed card catalog.
//!
//! The sheet is read through the values API as a two-dimensional grid of
//! strings. Row zero is the header row; `name` and `description` columns map
//! onto the card fields of the same name, and every other column becomes a
//! free-form attribute. Images are always assigned locally, never read from
//! the sheet.

use std::collections::HashMap;

use decksync_core::Card;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CardSource;
use crate::errors::CatalogError;
use crate::images::ImageAssigner;

/// Default base URL of the spreadsheet values API.
pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Default cell range to read.
pub const DEFAULT_RANGE: &str = "Sheet1!A:Z";

/// Header names with dedicated card fields; everything else becomes an
/// attribute.
const RESERVED_HEADERS: [&str; 3] = ["name", "description", "imageUrl"];

/// Where and how to fetch the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    /// Spreadsheet document id.
    pub spreadsheet_id: String,
    /// API key with read access to the sheet.
    pub api_key: String,
    /// Cell range to read, header row included.
    #[serde(default = "default_range")]
    pub range: String,
    /// Base URL of the values API; overridable for tests.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_range() -> String {
    DEFAULT_RANGE.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            api_key: String::new(),
            range: default_range(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Card catalog read from a spreadsheet values endpoint.
pub struct SheetsCatalog {
    config: CatalogConfig,
    http: reqwest::Client,
    images: ImageAssigner,
}

impl SheetsCatalog {
    /// Create a catalog for `config`.
    #[must_use]
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            images: ImageAssigner::new(),
        }
    }

    fn values_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}?key={}",
            self.config.base_url, self.config.spreadsheet_id, self.config.range, self.config.api_key
        )
    }

    /// Build cards from the raw grid. Row zero is the header row; an empty
    /// grid means an empty catalog, not an error.
    fn cards_from_rows(&self, rows: &[Vec<String>]) -> Vec<Card> {
        let Some((headers, data_rows)) = rows.split_first() else {
            return Vec::new();
        };
        let name_column = headers.iter().position(|header| header == "name");
        let description_column = headers.iter().position(|header| header == "description");

        data_rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let id = format!("card-{}", index + 1);
                let column = |position: Option<usize>| {
                    position
                        .and_then(|at| row.get(at))
                        .cloned()
                        .unwrap_or_default()
                };
                let mut attributes = HashMap::new();
                for (at, header) in headers.iter().enumerate() {
                    if RESERVED_HEADERS.contains(&header.as_str()) {
                        continue;
                    }
                    let _ = attributes.insert(
                        header.clone(),
                        row.get(at).cloned().unwrap_or_default(),
                    );
                }
                let image_url = self.images.image_url(&id);
                Card {
                    id,
                    name: column(name_column),
                    description: column(description_column),
                    image_url,
                    attributes,
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl CardSource for SheetsCatalog {
    async fn fetch_cards(&self) -> Result<Vec<Card>, CatalogError> {
        debug!(
            spreadsheet = %self.config.spreadsheet_id,
            range = %self.config.range,
            "fetching card catalog"
        );
        let response = self.http.get(self.values_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }
        let body: ValuesResponse = response
            .json()
            .await
            .map_err(|err| CatalogError::Malformed(err.to_string()))?;
        let cards = self.cards_from_rows(&body.values);
        debug!(count = cards.len(), "card catalog loaded");
        Ok(cards)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
