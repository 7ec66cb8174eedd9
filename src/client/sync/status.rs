//! # Connection Status Broadcaster
//!
//! Owns the page's online/offline state and fans transitions out to
//! subscribers. Only real flips notify; repeated same-state signals are
//! no-ops. Each subscriber runs in isolation, so a failing or panicking
//! callback is logged and the remaining subscribers still hear the event.

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::sync::network_monitor::NetworkProbe;
use crate::client::sync::overlay::{OfflineOverlay, ToastKind};
use crate::shared::error::SyncError;

/// Page connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Offline,
}

impl ConnectionStatus {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl From<bool> for ConnectionStatus {
    fn from(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Transition delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// offline → online
    WentOnline,
    /// online → offline
    WentOffline,
}

/// Handle returned by [`StatusBroadcaster::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type StatusCallback = Arc<dyn Fn(StatusEvent, ConnectionStatus) -> Result<(), String> + Send + Sync>;

/// Online/offline state machine with subscriber fan-out
pub struct StatusBroadcaster {
    state: Mutex<ConnectionStatus>,
    subscribers: Mutex<Vec<(SubscriberId, StatusCallback)>>,
    next_id: AtomicU64,
    overlay: Arc<dyn OfflineOverlay>,
    probe: Arc<NetworkProbe>,
}

impl fmt::Debug for StatusBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBroadcaster")
            .field("state", &*lock(&self.state))
            .field("subscribers", &lock(&self.subscribers).len())
            .finish()
    }
}

impl StatusBroadcaster {
    /// Create a broadcaster seeded from the host-reported link state
    pub fn new(probe: Arc<NetworkProbe>, overlay: Arc<dyn OfflineOverlay>) -> Self {
        let initial = ConnectionStatus::from(probe.link_up());
        if !initial.is_online() {
            overlay.show();
        }
        tracing::info!("[Status] Initial connection status: {}", initial);
        Self {
            state: Mutex::new(initial),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            overlay,
            probe,
        }
    }

    /// Current status
    pub fn status(&self) -> ConnectionStatus {
        *lock(&self.state)
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    /// Register a callback for state flips
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(StatusEvent, ConnectionStatus) -> Result<(), String> + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.subscribers).push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Host `online` event or successful probe
    pub fn set_online(&self) {
        if self.transition(ConnectionStatus::Online) {
            tracing::info!("[Status] Connection restored");
            self.overlay.hide();
            self.notify(StatusEvent::WentOnline, ConnectionStatus::Online);
        }
    }

    /// Host `offline` event
    pub fn set_offline(&self) {
        if self.transition(ConnectionStatus::Offline) {
            tracing::warn!("[Status] Connection lost");
            self.overlay.show();
            self.notify(StatusEvent::WentOffline, ConnectionStatus::Offline);
        }
    }

    /// Run `action` only while online; otherwise tell the user and reject
    pub async fn require_online<F, Fut, T>(&self, action: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        if !self.is_online() {
            self.overlay
                .toast(&SyncError::Offline.to_string(), ToastKind::Error);
            return Err(SyncError::Offline);
        }
        action().await
    }

    /// Manual retry from the overlay: re-probe and report the outcome
    pub async fn retry_connection(&self) -> bool {
        if self.probe.check_connectivity().await {
            self.set_online();
            self.overlay.toast("Connection restored!", ToastKind::Success);
            true
        } else {
            self.overlay
                .toast("Still offline. Please check your connection.", ToastKind::Error);
            false
        }
    }

    /// Swap state; true only on an actual flip
    fn transition(&self, next: ConnectionStatus) -> bool {
        let mut state = lock(&self.state);
        if *state == next {
            return false;
        }
        *state = next;
        true
    }

    fn notify(&self, event: StatusEvent, current: ConnectionStatus) {
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let subscribers: Vec<(SubscriberId, StatusCallback)> = lock(&self.subscribers).clone();
        for (id, callback) in subscribers {
            match catch_unwind(AssertUnwindSafe(|| callback(event, current))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("[Status] Subscriber {:?} failed: {}", id, e);
                }
                Err(_) => {
                    tracing::error!("[Status] Subscriber {:?} panicked", id);
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
