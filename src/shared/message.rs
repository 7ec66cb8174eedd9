/**
 * Worker Message Protocol
 *
 * Messages exchanged between the page context and the background cache
 * worker. The two contexts never share memory; everything crosses as one of
 * these values. The JSON shape uses an internal `type` tag so the wire form is
 * `{"type": "SKIP_WAITING"}`, `{"type": "CACHE_URLS", "urls": [...]}` and
 * `{"type": "PROCESS_PENDING_DELETIONS"}`.
 */
use serde::{Deserialize, Serialize};

/// Page → worker messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate a waiting worker version immediately
    SkipWaiting,
    /// Add arbitrary URLs to the static cache generation
    CacheUrls {
        /// Locators to fetch and store
        urls: Vec<String>,
    },
}

/// Worker → page messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Re-run the pending deletion drain
    ProcessPendingDeletions,
}
