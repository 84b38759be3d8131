//! # decksync-settings
//!
//! Layered configuration for the deck tools. Serde defaults come first, an
//! optional JSON settings file is deep-merged over them, and a small set of
//! environment variables wins over both.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;

use decksync_core::ReconnectPolicy;
use serde::{Deserialize, Serialize};

pub use errors::SettingsError;
pub use loader::{load_settings, load_settings_from_path, settings_path};

/// Top-level settings tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeckSettings {
    /// Realtime server connection settings.
    pub server: ServerSettings,
    /// Card catalog settings.
    pub catalog: CatalogSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Connection settings for the realtime server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Websocket URL.
    pub url: String,
    /// Reconnect and backoff behavior.
    pub reconnect: ReconnectPolicy,
    /// Keepalive ping interval in milliseconds.
    pub keepalive_interval_ms: u64,
    /// Connection-count poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Websocket handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3001/ws".to_string(),
            reconnect: ReconnectPolicy::default(),
            keepalive_interval_ms: 15_000,
            poll_interval_ms: 5000,
            connect_timeout_ms: 20_000,
        }
    }
}

/// Card catalog settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSettings {
    /// Spreadsheet document id.
    pub spreadsheet_id: String,
    /// API key with read access to the sheet.
    pub api_key: String,
    /// Cell range to read, header row included.
    pub range: String,
    /// Base URL of the values API.
    pub base_url: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            api_key: String::new(),
            range: "Sheet1!A:Z".to_string(),
            base_url: "https://sheets.googleapis.com".to_string(),
        }
    }
}

impl CatalogSettings {
    /// Whether a spreadsheet id and API key are both present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.spreadsheet_id.is_empty() && !self.api_key.is_empty()
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Env-filter directive, e.g. `info` or `decksync_client=debug`.
    pub level: String,
    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
