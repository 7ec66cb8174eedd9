//! # Background Cache Worker
//!
//! The cache worker runs as its own actor. Pages talk to it only through a
//! `WorkerHandle` (an mpsc inbox) and hear back through the client broadcast
//! channel; no memory is shared between the two contexts.
//!
//! ## Architecture
//!
//! - **Request**: request/response snapshots and cache identity
//! - **Fetch**: network access (`reqwest` in production)
//! - **Cache**: named cache generations
//! - **Strategy**: ordered (predicate, strategy) routing table
//! - **Manifest**: build-time precache list
//! - **Lifecycle**: install/activate state machine
//! - **Clients**: broadcast fan-out to open pages
//! - **Manager**: the `CacheManager` tying these together
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use balloonpop_sync::shared::config::SyncConfig;
//! use balloonpop_sync::shared::message::WorkerMessage;
//! use balloonpop_sync::worker::{self, CacheManager, CacheStorage, HttpFetcher, StaticAssetManifest};
//!
//! # async fn example() -> Result<(), balloonpop_sync::shared::error::SyncError> {
//! let config = SyncConfig::default();
//! let fetcher = Arc::new(HttpFetcher::new(reqwest::Client::new(), config.probe_timeout));
//! let manager = CacheManager::new(
//!     &config,
//!     StaticAssetManifest::balloon_pop(),
//!     fetcher,
//!     Arc::new(CacheStorage::new()),
//! )?;
//!
//! let handle = worker::spawn(manager);
//! handle.post_message(WorkerMessage::SkipWaiting).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clients;
pub mod fetch;
pub mod lifecycle;
pub mod manager;
pub mod manifest;
pub mod request;
pub mod strategy;

pub use cache::{Cache, CacheStorage};
pub use clients::ClientRegistry;
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use lifecycle::WorkerState;
pub use manager::CacheManager;
pub use manifest::StaticAssetManifest;
pub use request::{Request, Response};
pub use strategy::{Router, Strategy};

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::shared::error::SyncError;
use crate::shared::message::{ClientMessage, WorkerMessage};

const INBOX_CAPACITY: usize = 256;

/// Events delivered to the worker actor
#[derive(Debug)]
pub enum WorkerEvent {
    /// Page → worker message
    Message(WorkerMessage),
    /// Platform background sync
    Sync {
        tag: String,
        reply: Option<oneshot::Sender<usize>>,
    },
    /// Intercepted request
    Fetch {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    /// Lifecycle state query
    State(oneshot::Sender<WorkerState>),
    Shutdown,
}

/// Cloneable handle to a running worker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    inbox: mpsc::Sender<WorkerEvent>,
    clients: ClientRegistry,
}

impl WorkerHandle {
    /// Connect a page to worker → client messages
    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.clients.subscribe()
    }

    pub async fn post_message(&self, message: WorkerMessage) -> Result<(), SyncError> {
        self.send(WorkerEvent::Message(message)).await
    }

    /// Deliver a background sync event; returns how many clients were notified
    pub async fn fire_sync(&self, tag: &str) -> Result<usize, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerEvent::Sync {
            tag: tag.to_string(),
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| SyncError::WorkerStopped)
    }

    /// Queue a background sync event without waiting
    pub fn try_fire_sync(&self, tag: &str) -> Result<(), SyncError> {
        self.inbox
            .try_send(WorkerEvent::Sync {
                tag: tag.to_string(),
                reply: None,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SyncError::network("worker inbox full"),
                mpsc::error::TrySendError::Closed(_) => SyncError::WorkerStopped,
            })
    }

    /// Route a request through the worker
    pub async fn fetch(&self, request: Request) -> Result<Response, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerEvent::Fetch { request, reply }).await?;
        rx.await.map_err(|_| SyncError::WorkerStopped)
    }

    pub async fn state(&self) -> Result<WorkerState, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerEvent::State(reply)).await?;
        rx.await.map_err(|_| SyncError::WorkerStopped)
    }

    pub async fn shutdown(&self) {
        let _ = self.inbox.send(WorkerEvent::Shutdown).await;
    }

    async fn send(&self, event: WorkerEvent) -> Result<(), SyncError> {
        self.inbox
            .send(event)
            .await
            .map_err(|_| SyncError::WorkerStopped)
    }
}

/// Start the worker actor: install, activate unless an older generation is
/// still serving, then process events until shutdown.
pub fn spawn(manager: CacheManager) -> WorkerHandle {
    let (inbox, mut events) = mpsc::channel(INBOX_CAPACITY);
    let clients = manager.clients().clone();
    let manager = Arc::new(manager);

    tokio::spawn(async move {
        match manager.install().await {
            Ok(()) if manager.has_predecessor().await => {
                tracing::info!("[Worker] Installed; waiting for skip-waiting to replace the old generation");
            }
            Ok(()) => {
                if let Err(e) = manager.activate().await {
                    tracing::error!("[Worker] Activation failed: {}", e);
                }
            }
            Err(e) => tracing::error!("[Worker] Install failed: {}", e),
        }

        while let Some(event) = events.recv().await {
            match event {
                WorkerEvent::Message(message) => {
                    if let Err(e) = manager.handle_message(message).await {
                        tracing::warn!("[Worker] Message handling failed: {}", e);
                    }
                }
                WorkerEvent::Sync { tag, reply } => {
                    let notified = manager.handle_sync(&tag);
                    if let Some(reply) = reply {
                        let _ = reply.send(notified);
                    }
                }
                WorkerEvent::Fetch { request, reply } => {
                    let manager = manager.clone();
                    tokio::spawn(async move {
                        let response = manager.handle_fetch(&request).await;
                        let _ = reply.send(response);
                    });
                }
                WorkerEvent::State(reply) => {
                    let _ = reply.send(manager.state().await);
                }
                WorkerEvent::Shutdown => break,
            }
        }
        tracing::info!("[Worker] Stopped");
    });

    WorkerHandle { inbox, clients }
}
