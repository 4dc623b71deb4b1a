//! Error types for foreman-inventory

use std::path::PathBuf;

use thiserror::Error;

use crate::types::HostGroupId;

/// Errors that can occur while building or serving the inventory
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Missing or invalid settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration {path}: {source}")]
    ConfigParse {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP request failed (connection, TLS, body decoding)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Foreman returned a non-success status
    #[error("API error ({status}) for {url}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body
        message: String,
    },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A cache file could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A cache file exists but does not contain valid JSON
    #[error("corrupt cache file {path}: {source}")]
    CorruptCache {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A host-group referenced by a host or an ancestry path does not exist
    #[error("host-group {0} could not be resolved")]
    MissingHostGroup(HostGroupId),

    /// A host or host-group record lacks a field the inventory needs
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A configured group pattern is malformed
    #[error("invalid group pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending template
        pattern: String,
        /// What is wrong with it
        reason: String,
    },
}

impl InventoryError {
    /// Check if error came from talking to Foreman
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, InventoryError::Http(_) | InventoryError::Api { .. })
    }

    /// Check if error was raised before any network activity
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            InventoryError::Config(_)
                | InventoryError::ConfigParse { .. }
                | InventoryError::InvalidPattern { .. }
        )
    }
}

/// Result type for inventory operations
pub type Result<T> = std::result::Result<T, InventoryError>;
