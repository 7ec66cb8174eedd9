//! Balloon Pop Sync - Offline Caching and Synchronization
//!
//! The offline layer of the Balloon Pop Maths game: a background cache worker
//! that intercepts the page's requests, paired with a page-side queue that
//! defers remote image deletions until the network is back.
//!
//! # Module Structure
//!
//! - **`shared`** - Types used by both execution contexts
//!   - Error taxonomy, configuration, platform capabilities
//!   - Page ↔ worker message protocol
//!   - Durable key-value storage
//!
//! - **`client`** - The page execution context
//!   - Network probe and recovery loop
//!   - Online/offline status broadcaster and overlay
//!   - Pending deletion queue and remote deletion client
//!   - `OfflineCoordinator` wiring them together
//!
//! - **`worker`** - The background cache execution context
//!   - Cache generations, routing table, static asset manifest
//!   - Install / activate lifecycle
//!   - `CacheManager` actor reachable through a `WorkerHandle`
//!
//! # Concurrency
//!
//! The page and the worker are independent actors. They communicate only by
//! message passing: `WorkerMessage` values over the worker's mpsc inbox and
//! `ClientMessage` values over a broadcast channel back to every open page.
//!
//! # Error Handling
//!
//! - `Result<T, SyncError>` for fallible public operations
//! - Background work (queue drains, revalidation, precache of optional assets)
//!   logs failures through `tracing` and never surfaces them to the user

/// Shared types and data structures
pub mod shared;

/// Page-side connectivity and deferred deletion
pub mod client;

/// Background cache worker
pub mod worker;
