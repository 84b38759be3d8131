//! Settings loading: defaults, then file, then environment.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::DeckSettings;
use crate::errors::SettingsError;

/// Environment variables recognized as overrides.
const ENV_SERVER_URL: &str = "DECKSYNC_SERVER_URL";
const ENV_LOG_LEVEL: &str = "DECKSYNC_LOG_LEVEL";
const ENV_SHEETS_ID: &str = "DECKSYNC_SHEETS_ID";
const ENV_SHEETS_API_KEY: &str = "DECKSYNC_SHEETS_API_KEY";
const ENV_SHEETS_RANGE: &str = "DECKSYNC_SHEETS_RANGE";
const ENV_MAX_RECONNECT_ATTEMPTS: &str = "DECKSYNC_MAX_RECONNECT_ATTEMPTS";

/// Default settings file location: `~/.decksync/settings.json`.
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".decksync").join("settings.json")
}

/// Load settings from the default path with environment overrides applied.
pub fn load_settings() -> Result<DeckSettings, SettingsError> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`.
///
/// Starts from serde defaults, deep-merges the file's JSON over them when
/// the file exists, then applies environment overrides. A missing file is
/// not an error; an unreadable or malformed one is.
pub fn load_settings_from_path(path: &Path) -> Result<DeckSettings, SettingsError> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, reading override variables through `env`.
fn load_settings_with(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<DeckSettings, SettingsError> {
    let mut merged = serde_json::to_value(DeckSettings::default())?;
    if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let overlay: Value = serde_json::from_str(&raw)?;
        deep_merge(&mut merged, overlay);
        debug!(path = %path.display(), "settings file loaded");
    }
    let mut settings: DeckSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, &env);
    Ok(settings)
}

/// Recursively merge `overlay` into `base`. Objects merge key-by-key;
/// every other value replaces the base value outright.
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        let _ = base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(settings: &mut DeckSettings, env: &impl Fn(&str) -> Option<String>) {
    if let Some(url) = read_env(env, ENV_SERVER_URL) {
        settings.server.url = url;
    }
    if let Some(level) = read_env(env, ENV_LOG_LEVEL) {
        settings.logging.level = level;
    }
    if let Some(id) = read_env(env, ENV_SHEETS_ID) {
        settings.catalog.spreadsheet_id = id;
    }
    if let Some(key) = read_env(env, ENV_SHEETS_API_KEY) {
        settings.catalog.api_key = key;
    }
    if let Some(range) = read_env(env, ENV_SHEETS_RANGE) {
        settings.catalog.range = range;
    }
    if let Some(attempts) = read_env_u32(env, ENV_MAX_RECONNECT_ATTEMPTS) {
        settings.server.reconnect.max_attempts = attempts;
    }
}

fn read_env(env: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    env(name).and_then(normalized)
}

fn read_env_u32(env: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u32> {
    env(name).and_then(|raw| parse_u32(name, &raw))
}

/// Trim whitespace and treat an empty value as unset.
fn normalized(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a numeric override. Invalid values are ignored with a warning so a
/// typo never takes the defaults down.
fn parse_u32(name: &str, raw: &str) -> Option<u32> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, value = raw, "ignoring invalid numeric override");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
