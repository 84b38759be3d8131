//! # decksync-logging
//!
//! Tracing subscriber setup shared by the deck tools. One [`init`] call
//! installs an env-filtered `tracing` subscriber with either a compact or
//! JSON formatter; `RUST_LOG` always wins over the configured level.

#![deny(unsafe_code)]

use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-oriented compact lines.
    #[default]
    Compact,
    /// One JSON object per line, for ingestion.
    Json,
}

/// Install the global tracing subscriber.
///
/// `level` is an env-filter directive such as `info` or
/// `decksync_client=debug`, used when `RUST_LOG` is unset. Calling `init`
/// again once a subscriber is installed is a no-op.
pub fn init(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let already_set = match format {
        LogFormat::Compact => builder.compact().try_init().is_err(),
        LogFormat::Json => builder.json().try_init().is_err(),
    };
    if already_set {
        tracing::debug!("logging already initialized; keeping the existing subscriber");
    }
}
