//! Shared Error Types
//!
//! This module defines the error taxonomy used by both execution contexts:
//! the page (probe, status, pending-deletion queue) and the background cache
//! worker. Background subsystems never surface these to the user; they are
//! logged and folded into retry or fallback behaviour.
//!
//! # Error Categories
//!
//! - `Network` / `Timeout` - transient failures, always retried by the caller
//! - `Remote` - the object store rejected a request (anything but not-found)
//! - `Storage` / `Serialization` - durable key-value store failures
//! - `Offline` - an online-only action was requested while offline
//!
//! # Usage
//!
//! ```rust
//! use balloonpop_sync::shared::error::SyncError;
//!
//! let error = SyncError::remote("storage/unauthorized", "permission denied");
//! assert!(!error.is_transient());
//! ```
use thiserror::Error;

use crate::shared::config::ConfigError;

/// Errors raised by the offline caching and synchronization layer
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    /// Durable storage read or write failed
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// Network request could not complete
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// Operation abandoned after its deadline
    #[error("Timed out after {millis}ms")]
    Timeout {
        /// Elapsed deadline in milliseconds
        millis: u64,
    },

    /// Action requires connectivity and the app is offline
    #[error("You are offline. Please check your connection and try again.")]
    Offline,

    /// Remote object store returned an error other than not-found
    #[error("Remote error [{code}]: {message}")]
    Remote {
        /// Backend error code
        code: String,
        /// Human-readable error message
        message: String,
    },

    /// A required collaborator or setting is missing
    #[error("Not configured: {what}")]
    NotConfigured {
        /// Name of the missing piece
        what: String,
    },

    /// The background cache worker is not running
    #[error("Cache worker is not running")]
    WorkerStopped,

    /// Worker lifecycle step requested from the wrong state
    #[error("Invalid worker transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new remote error
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a new not-configured error
    pub fn not_configured(what: impl Into<String>) -> Self {
        Self::NotConfigured { what: what.into() }
    }

    /// Whether a later attempt could plausibly succeed without intervention
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Offline | Self::Storage { .. }
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { millis: 0 }
        } else {
            Self::network(err.to_string())
        }
    }
}
