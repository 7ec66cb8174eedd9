//! # Connectivity and Sync Coordination
//!
//! Page-side orchestration of the offline layer. The `OfflineCoordinator`
//! owns every page service, constructed once at startup and handed out by
//! reference; nothing is looked up implicitly.
//!
//! ## Architecture
//!
//! - **Network Monitor**: Real connectivity probe plus a recovery loop
//! - **Status**: Online/offline state machine with fault-isolated subscribers
//! - **Overlay**: Blocking offline overlay and transient notices
//! - **Offline Queue**: Deferred remote deletions, drained on reconnect
//!
//! ## Usage
//!
//! ```rust,no_run
//! use balloonpop_sync::client::sync::{CoordinatorParts, OfflineCoordinator};
//! use balloonpop_sync::shared::capabilities::Capabilities;
//! use balloonpop_sync::shared::config::SyncConfig;
//!
//! # async fn example(parts: CoordinatorParts) -> Result<(), balloonpop_sync::shared::error::SyncError> {
//! let coordinator =
//!     OfflineCoordinator::start(SyncConfig::default(), Capabilities::detect(), parts).await?;
//!
//! // Host link events
//! coordinator.host_offline();
//! coordinator.host_online();
//!
//! // Delete an uploaded image, deferring while offline
//! coordinator.delete_image("https://firebasestorage.googleapis.com/v0/b/app/o/a.png").await;
//! # Ok(())
//! # }
//! ```

pub mod network_monitor;
pub mod overlay;
pub mod status;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::client::offline::queue::{DeletionOutcome, PendingDeletionQueue};
use crate::client::offline::remote::{ObjectStoreConnector, RemoteDeletionClient};
use crate::shared::capabilities::Capabilities;
use crate::shared::config::SyncConfig;
use crate::shared::error::SyncError;
use crate::shared::message::ClientMessage;
use crate::shared::storage::KeyValueStore;
use crate::worker::WorkerHandle;

use network_monitor::{HostLink, NetworkProbe, ProbeTransport};
use overlay::OfflineOverlay;
use status::{StatusBroadcaster, StatusEvent, SubscriberId};

/// A worker-requested drain this soon after a finished pass repeats the
/// reconnect drain and is skipped
const SYNC_ECHO_WINDOW: Duration = Duration::from_secs(2);

/// External collaborators the coordinator is built from
pub struct CoordinatorParts {
    /// Durable store holding the pending deletion record
    pub store: Arc<dyn KeyValueStore>,
    /// Probe round-trip transport
    pub transport: Arc<dyn ProbeTransport>,
    /// Host link flag, updated by `host_online`/`host_offline`
    pub link: Arc<HostLink>,
    /// Object store connector used lazily by the deletion client
    pub connector: Arc<dyn ObjectStoreConnector>,
    /// UI overlay
    pub overlay: Arc<dyn OfflineOverlay>,
}

/// Page-side offline service graph
pub struct OfflineCoordinator {
    config: SyncConfig,
    capabilities: Capabilities,
    link: Arc<HostLink>,
    probe: Arc<NetworkProbe>,
    status: Arc<StatusBroadcaster>,
    queue: Arc<PendingDeletionQueue>,
    subscriptions: Mutex<Vec<SubscriberId>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl OfflineCoordinator {
    /// Build the service graph and start background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(
        config: SyncConfig,
        capabilities: Capabilities,
        parts: CoordinatorParts,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let probe = Arc::new(NetworkProbe::new(
            &config,
            capabilities.link_events_reliable,
            parts.transport,
            parts.link.clone(),
        ));
        let status = Arc::new(StatusBroadcaster::new(probe.clone(), parts.overlay));
        let remote = Arc::new(RemoteDeletionClient::new(parts.connector));
        let queue = Arc::new(
            PendingDeletionQueue::load(&config, parts.store, remote, status.clone()).await,
        );

        let drain_on_reconnect = {
            let queue = queue.clone();
            status.subscribe(move |event, _| {
                if event != StatusEvent::WentOnline {
                    return Ok(());
                }
                let handle = tokio::runtime::Handle::try_current()
                    .map_err(|e| format!("no runtime for drain: {}", e))?;
                let queue = queue.clone();
                handle.spawn(async move {
                    queue.drain().await;
                });
                Ok(())
            })
        };

        let recovery = probe
            .clone()
            .spawn_recovery_loop(status.clone(), config.probe_interval);

        tracing::info!(
            "[Sync] Offline coordinator started ({:?}, status {})",
            capabilities.platform,
            status.status()
        );

        let coordinator = Self {
            config,
            capabilities,
            link: parts.link,
            probe,
            status,
            queue,
            subscriptions: Mutex::new(vec![drain_on_reconnect]),
            tasks: Mutex::new(vec![recovery]),
        };

        if coordinator.status.is_online() && !coordinator.queue.is_empty().await {
            let queue = coordinator.queue.clone();
            coordinator.track(tokio::spawn(async move {
                queue.drain().await;
            }));
        }

        Ok(coordinator)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn probe(&self) -> &Arc<NetworkProbe> {
        &self.probe
    }

    pub fn status(&self) -> &Arc<StatusBroadcaster> {
        &self.status
    }

    pub fn queue(&self) -> &Arc<PendingDeletionQueue> {
        &self.queue
    }

    /// Host reported the link came up
    pub fn host_online(&self) {
        self.link.set(true);
        self.status.set_online();
    }

    /// Host reported the link went down
    pub fn host_offline(&self) {
        self.link.set(false);
        self.status.set_offline();
    }

    /// Startup connectivity check.
    ///
    /// A failed probe marks the page offline but leaves the host link flag
    /// untouched, so the recovery loop keeps probing the network.
    pub async fn confirm_connectivity(&self) -> bool {
        let reachable = self.probe.check_connectivity().await;
        if reachable {
            self.status.set_online();
        } else {
            tracing::warn!("[Sync] Startup probe failed, starting offline");
            self.status.set_offline();
        }
        reachable
    }

    /// Manual retry from the offline overlay
    pub async fn retry_connection(&self) -> bool {
        self.status.retry_connection().await
    }

    /// Delete an uploaded image, deferring while offline or on failure
    pub async fn delete_image(&self, source_url: &str) -> DeletionOutcome {
        self.queue.request_deletion(source_url).await
    }

    /// Drain whenever the worker broadcasts `PROCESS_PENDING_DELETIONS`
    pub fn attach_worker(&self, mut messages: broadcast::Receiver<ClientMessage>) {
        let queue = self.queue.clone();
        self.track(tokio::spawn(async move {
            loop {
                match messages.recv().await {
                    Ok(ClientMessage::ProcessPendingDeletions) => {
                        tracing::debug!("[Sync] Worker requested pending deletion drain");
                        queue.drain_unless_recent(SYNC_ECHO_WINDOW).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("[Sync] Missed {} worker messages", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Ask the worker for a background sync on every reconnect.
    ///
    /// Returns false without registering when the host has no background sync.
    pub fn register_background_sync(&self, worker: WorkerHandle) -> bool {
        if !self.capabilities.background_sync {
            tracing::debug!("[Sync] Background sync unavailable on this host");
            return false;
        }
        let tag = self.config.sync_tag.clone();
        let id = self.status.subscribe(move |event, _| {
            if event != StatusEvent::WentOnline {
                return Ok(());
            }
            worker
                .try_fire_sync(&tag)
                .map_err(|e| format!("sync registration failed: {}", e))
        });
        lock(&self.subscriptions).push(id);
        true
    }

    /// Stop background tasks and drop subscriptions
    pub fn shutdown(&self) {
        for id in lock(&self.subscriptions).drain(..) {
            self.status.unsubscribe(id);
        }
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        tracing::info!("[Sync] Offline coordinator stopped");
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

impl Drop for OfflineCoordinator {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
