//! # Pending Deletion Queue
//!
//! Durable, ordered queue of remote image deletions that could not run yet,
//! either because the page was offline or because the remote call failed.
//!
//! ## Features
//!
//! - **Persistent Queue**: Survives reloads; the whole queue is rewritten on every mutation
//! - **Insertion Order**: Items are processed strictly in the order they were queued
//! - **Snapshot Drains**: Items queued during a drain wait for the next drain
//! - **Attempt Ceiling**: Items are dropped with a warning after the last failed attempt
//!
//! ## Usage
//!
//! ```rust,no_run
//! use balloonpop_sync::client::offline::queue::PendingDeletionQueue;
//!
//! # async fn example(queue: PendingDeletionQueue) {
//! // Queue a deletion for later
//! queue.enqueue("https://firebasestorage.googleapis.com/v0/b/app/o/imgs%2Fa.png", "imgs/a.png").await;
//!
//! // Process pending deletions once back online
//! let report = queue.drain().await;
//! println!("deleted {} of {}", report.deleted, report.attempted);
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::client::offline::remote::{storage_path_from_url, RemoteDeletionClient};
use crate::client::offline::retry::{RetryDecision, RetryPolicy};
use crate::client::sync::status::StatusBroadcaster;
use crate::shared::config::SyncConfig;
use crate::shared::storage::KeyValueStore;

/// A deferred remote deletion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingDeletion {
    /// In-memory identity; records written before ids existed get a fresh one
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// URL the target was derived from
    #[serde(rename = "imageUrl", alias = "sourceReference")]
    pub source_reference: String,
    /// Object store path to delete
    #[serde(rename = "storagePath", alias = "remoteTarget")]
    pub remote_target: String,
    /// When the deletion was first queued
    #[serde(rename = "addedAt", alias = "queuedAt", with = "added_at")]
    pub queued_at: DateTime<Utc>,
    /// Attempts made so far
    #[serde(default)]
    pub attempts: u32,
}

impl PendingDeletion {
    pub fn new(source_reference: impl Into<String>, remote_target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_reference: source_reference.into(),
            remote_target: remote_target.into(),
            queued_at: Utc::now(),
            attempts: 0,
        }
    }
}

/// Result of [`PendingDeletionQueue::request_deletion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The URL does not point at the object store; nothing to do
    NotApplicable,
    /// Deleted (or already absent) right away
    Deleted,
    /// Deferred to a later drain
    Queued,
}

/// Side effects of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items attempted in this pass
    pub attempted: usize,
    /// Items removed after a successful delete
    pub deleted: usize,
    /// Items kept for the next drain
    pub retained: usize,
    /// Items dropped at the attempt ceiling
    pub dropped: usize,
}

/// Queue statistics
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Items waiting
    pub pending: usize,
    /// Highest attempt count among waiting items
    pub max_attempts_seen: u32,
    /// Queue time of the oldest waiting item
    pub oldest_queued_at: Option<DateTime<Utc>>,
}

/// Durable queue of pending deletions
pub struct PendingDeletionQueue {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    items: Mutex<Vec<PendingDeletion>>,
    drain_lock: Mutex<()>,
    last_pass: Mutex<Option<Instant>>,
    remote: Arc<RemoteDeletionClient>,
    status: Arc<StatusBroadcaster>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for PendingDeletionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDeletionQueue")
            .field("storage_key", &self.storage_key)
            .field("policy", &self.policy)
            .finish()
    }
}

impl PendingDeletionQueue {
    /// Load the queue from durable storage.
    ///
    /// A missing key is an empty queue. An unreadable or corrupt record is
    /// logged and also treated as empty; it is overwritten on the next mutation.
    pub async fn load(
        config: &SyncConfig,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<RemoteDeletionClient>,
        status: Arc<StatusBroadcaster>,
    ) -> Self {
        let storage_key = config.queue_storage_key.clone();
        let items = match store.get(&storage_key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<PendingDeletion>>(&raw) {
                Ok(items) => items,
                Err(e) => {
                    tracing::error!("[Queue] Corrupt pending deletion record, resetting: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!("[Queue] Could not read pending deletions: {}", e);
                Vec::new()
            }
        };
        if !items.is_empty() {
            tracing::info!("[Queue] Restored {} pending deletions", items.len());
        }

        Self {
            store,
            storage_key,
            items: Mutex::new(items),
            drain_lock: Mutex::new(()),
            last_pass: Mutex::new(None),
            remote,
            status,
            policy: RetryPolicy::new(config.max_attempts),
        }
    }

    /// Append a deletion and persist immediately
    pub async fn enqueue(&self, source_reference: &str, remote_target: &str) {
        let mut items = self.items.lock().await;
        items.push(PendingDeletion::new(source_reference, remote_target));
        self.persist(&items).await;
        tracing::info!(
            "[Queue] Queued deletion of {} ({} pending)",
            remote_target,
            items.len()
        );
    }

    /// Delete the object behind `source_url` now if possible, else queue it
    pub async fn request_deletion(&self, source_url: &str) -> DeletionOutcome {
        let Some(target) = storage_path_from_url(source_url) else {
            tracing::debug!("[Queue] Not a storage URL, skipping: {}", source_url);
            return DeletionOutcome::NotApplicable;
        };

        if self.status.is_online() {
            match self.remote.delete_remote(&target).await {
                Ok(_) => return DeletionOutcome::Deleted,
                Err(e) => {
                    tracing::warn!("[Queue] Delete of {} failed, queueing: {}", target, e);
                }
            }
        }
        self.enqueue(source_url, &target).await;
        DeletionOutcome::Queued
    }

    /// Attempt every queued deletion once, in insertion order.
    ///
    /// No-op while offline or while another drain is running. Never fails;
    /// callers observe only the side effects and the returned counts.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        if !self.status.is_online() {
            tracing::debug!("[Queue] Offline, drain skipped");
            return report;
        }
        let Ok(_guard) = self.drain_lock.try_lock() else {
            tracing::debug!("[Queue] Drain already running");
            return report;
        };

        let snapshot = self.items.lock().await.clone();
        if snapshot.is_empty() {
            return report;
        }
        tracing::info!("[Queue] Draining {} pending deletions", snapshot.len());

        for entry in snapshot {
            let attempts = {
                let mut items = self.items.lock().await;
                let Some(item) = items.iter_mut().find(|i| i.id == entry.id) else {
                    continue;
                };
                item.attempts = item.attempts.saturating_add(1);
                let attempts = item.attempts;
                self.persist(&items).await;
                attempts
            };
            report.attempted += 1;

            match self.remote.delete_remote(&entry.remote_target).await {
                Ok(_) => {
                    self.remove(entry.id).await;
                    report.deleted += 1;
                }
                Err(e) => match self.policy.decide(attempts) {
                    RetryDecision::Retry => {
                        tracing::debug!(
                            "[Queue] Attempt {}/{} for {} failed: {}",
                            attempts,
                            self.policy.max_attempts(),
                            entry.remote_target,
                            e
                        );
                        report.retained += 1;
                    }
                    RetryDecision::GiveUp => {
                        tracing::warn!(
                            "[Queue] Giving up on {} after {} attempts: {}",
                            entry.remote_target,
                            attempts,
                            e
                        );
                        self.remove(entry.id).await;
                        report.dropped += 1;
                    }
                },
            }
        }

        *self.last_pass.lock().await = Some(Instant::now());
        tracing::info!(
            "[Queue] Drain complete: {} deleted, {} retained, {} dropped",
            report.deleted,
            report.retained,
            report.dropped
        );
        report
    }

    /// Drain unless a pass over a non-empty queue finished within `window`.
    ///
    /// For requests that echo a drain the page already ran, such as the
    /// background sync fired on the same reconnect.
    pub async fn drain_unless_recent(&self, window: Duration) -> DrainReport {
        if let Some(finished) = *self.last_pass.lock().await {
            if finished.elapsed() < window {
                tracing::debug!(
                    "[Queue] Last drain finished {:?} ago, skipping",
                    finished.elapsed()
                );
                return DrainReport::default();
            }
        }
        self.drain().await
    }

    /// Copy of the queued items in order
    pub async fn snapshot(&self) -> Vec<PendingDeletion> {
        self.items.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Get queue statistics
    pub async fn stats(&self) -> QueueStats {
        let items = self.items.lock().await;
        QueueStats {
            pending: items.len(),
            max_attempts_seen: items.iter().map(|i| i.attempts).max().unwrap_or(0),
            oldest_queued_at: items.iter().map(|i| i.queued_at).min(),
        }
    }

    /// Drop every queued item
    pub async fn clear(&self) {
        let mut items = self.items.lock().await;
        items.clear();
        self.persist(&items).await;
    }

    async fn remove(&self, id: Uuid) {
        let mut items = self.items.lock().await;
        items.retain(|i| i.id != id);
        self.persist(&items).await;
    }

    /// Rewrite the whole record; callers hold the items lock so writes stay ordered
    async fn persist(&self, items: &[PendingDeletion]) {
        let raw = match serde_json::to_string(items) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("[Queue] Could not serialize pending deletions: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(&self.storage_key, &raw).await {
            tracing::error!("[Queue] Could not persist pending deletions: {}", e);
        }
    }
}

/// `addedAt` is written as RFC 3339; epoch milliseconds are accepted on read
mod added_at {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| serde::de::Error::custom("addedAt out of range")),
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(serde::de::Error::custom),
        }
    }
}
