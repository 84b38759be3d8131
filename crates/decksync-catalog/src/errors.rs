//! Catalog error types.

use thiserror::Error;

/// Errors from fetching or decoding the card catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The HTTP request itself failed.
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status.
    #[error("catalog request returned HTTP {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },
    /// The response body was not the expected values grid.
    #[error("malformed catalog response: {0}")]
    Malformed(String),
}
