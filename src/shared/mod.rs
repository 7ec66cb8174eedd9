//! Shared Module
//!
//! Types shared by the page context and the background cache worker. The two
//! contexts never share memory, so everything here is either plain data that
//! crosses the message channel or configuration both sides read at startup.

/// Shared error types
pub mod error;

/// Sync configuration
pub mod config;

/// Host platform capabilities
pub mod capabilities;

/// Page ↔ worker message protocol
pub mod message;

/// Durable key-value storage
pub mod storage;

/// Re-export commonly used types for convenience
pub use capabilities::{Capabilities, Platform};
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use error::SyncError;
pub use message::{ClientMessage, WorkerMessage};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
