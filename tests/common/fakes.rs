//! In-memory collaborators for integration tests

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use balloonpop_sync::client::offline::{ObjectStore, ObjectStoreConnector, RemoteError};
use balloonpop_sync::client::sync::network_monitor::{HostLink, ProbeTransport};
use balloonpop_sync::client::sync::overlay::{OfflineOverlay, ToastKind};
use balloonpop_sync::client::sync::CoordinatorParts;
use balloonpop_sync::shared::error::SyncError;
use balloonpop_sync::shared::storage::KeyValueStore;

/// Download URL for an object path in the test bucket
pub fn download_url(path: &str) -> String {
    format!(
        "https://firebasestorage.googleapis.com/v0/b/balloon-pop.appspot.com/o/{}?alt=media",
        path.replace('/', "%2F")
    )
}

/// Probe transport with a switchable outcome
#[derive(Debug)]
pub struct SwitchTransport {
    reachable: AtomicBool,
}

impl SwitchTransport {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn set(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProbeTransport for SwitchTransport {
    async fn probe(&self, _url: &str) -> Result<(), SyncError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::network("unreachable"))
        }
    }
}

/// Object store that records deletes and can be told to fail
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    deleted: Mutex<Vec<String>>,
    missing: Mutex<HashSet<String>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make `path` report not-found
    pub fn mark_missing(&self, path: &str) {
        self.missing.lock().unwrap().insert(path.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn delete_object(&self, path: &str) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Http {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        if self.missing.lock().unwrap().contains(path) {
            return Err(RemoteError::NotFound);
        }
        self.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

/// Connector handing out a shared [`InMemoryObjectStore`]
#[derive(Debug)]
pub struct InMemoryConnector(pub Arc<InMemoryObjectStore>);

#[async_trait]
impl ObjectStoreConnector for InMemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn ObjectStore>, SyncError> {
        Ok(self.0.clone())
    }
}

/// Overlay that counts what it was asked to do
#[derive(Debug, Default)]
pub struct CountingOverlay {
    pub shown: AtomicUsize,
    pub hidden: AtomicUsize,
    pub toasts: Mutex<Vec<(String, ToastKind)>>,
}

impl OfflineOverlay for CountingOverlay {
    fn show(&self) {
        self.shown.fetch_add(1, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
    }

    fn toast(&self, message: &str, kind: ToastKind) {
        self.toasts.lock().unwrap().push((message.to_string(), kind));
    }
}

/// Everything a coordinator needs, plus handles to steer it
pub struct Harness {
    pub link: Arc<HostLink>,
    pub transport: Arc<SwitchTransport>,
    pub objects: Arc<InMemoryObjectStore>,
    pub overlay: Arc<CountingOverlay>,
}

impl Harness {
    pub fn new(link_up: bool, reachable: bool) -> Self {
        Self {
            link: Arc::new(HostLink::new(link_up)),
            transport: Arc::new(SwitchTransport::new(reachable)),
            objects: InMemoryObjectStore::new(),
            overlay: Arc::new(CountingOverlay::default()),
        }
    }

    pub fn parts(&self, store: Arc<dyn KeyValueStore>) -> CoordinatorParts {
        CoordinatorParts {
            store,
            transport: self.transport.clone(),
            link: self.link.clone(),
            connector: Arc::new(InMemoryConnector(self.objects.clone())),
            overlay: self.overlay.clone(),
        }
    }
}
