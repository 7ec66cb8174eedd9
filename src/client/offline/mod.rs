//! # Offline Deletion Support
//!
//! Remote image cleanup that keeps working across connectivity loss.
//!
//! ## Key Components
//!
//! - `queue.rs`: durable pending deletion queue and drain
//! - `remote.rs`: lazily-connected object store deletion client
//! - `retry.rs`: attempt-ceiling retry policy

pub mod queue;
pub mod remote;
pub mod retry;

pub use queue::{DeletionOutcome, DrainReport, PendingDeletion, PendingDeletionQueue, QueueStats};
pub use remote::{
    storage_path_from_url, DeleteOutcome, FirebaseConnector, FirebaseStorage, ObjectStore,
    ObjectStoreConnector, RemoteDeletionClient, RemoteError,
};
pub use retry::{RetryDecision, RetryPolicy};
