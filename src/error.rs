// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Listing page could not be fetched (network, timeout or HTTP status)
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    /// A listing entry lacks the structure needed to build a thread record
    #[error("Malformed entry {id}: {message}")]
    MalformedEntry { id: String, message: String },

    /// Notification could not be delivered
    #[error("Notify error: {0}")]
    Notify(String),

    /// State file could not be read or written
    #[error("Persistence error for {path}: {message}")]
    Persistence { path: String, message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a malformed-entry error for the given entry id.
    pub fn malformed(id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedEntry {
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Create a notification error.
    pub fn notify(message: impl fmt::Display) -> Self {
        Self::Notify(message.to_string())
    }

    /// Create a persistence error for the given state file.
    pub fn persistence(path: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Persistence {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the poll loop must stop on this error.
    ///
    /// Only persistence failures qualify: once the state file cannot be
    /// written, the baseline on disk no longer matches what was reported.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}
