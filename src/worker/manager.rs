//! # Cache Manager
//!
//! Fetch interception and cache generation management for the background
//! worker context.
//!
//! ## Features
//!
//! - **Routed Strategies**: Each request is classified by the routing table
//!   and answered network-first, cache-first, navigation-with-fallback or
//!   stale-while-revalidate
//! - **Atomic Precache**: Install stores every manifest asset or none of them,
//!   retrying without sound assets when only those fail
//! - **Best-Effort Cross-Origin**: Cross-origin precache failures are logged
//! - **Generation Cleanup**: Activation deletes every generation but the
//!   current static one and the dynamic one, then claims all clients
//! - **Never Throws**: A fetch that neither cache nor network can answer gets
//!   a synthetic 503

use futures_util::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use url::Url;

use crate::shared::config::{ConfigError, SyncConfig, STATIC_CACHE_PREFIX};
use crate::shared::error::SyncError;
use crate::shared::message::{ClientMessage, WorkerMessage};
use crate::worker::cache::{Cache, CacheStorage};
use crate::worker::clients::ClientRegistry;
use crate::worker::fetch::Fetcher;
use crate::worker::lifecycle::WorkerState;
use crate::worker::manifest::{is_sound_asset, StaticAssetManifest};
use crate::worker::request::{CacheMode, Method, Request, Response};
use crate::worker::strategy::{Router, Strategy};

/// A precache batch that could not be fully fetched
#[derive(Debug)]
struct PrecacheFailure {
    failed: Vec<String>,
}

impl PrecacheFailure {
    fn only_sounds(&self) -> bool {
        self.failed.iter().all(|url| is_sound_asset(url))
    }
}

/// Background cache worker logic
pub struct CacheManager {
    static_name: String,
    dynamic_name: String,
    sync_tag: String,
    scope: Url,
    manifest: StaticAssetManifest,
    router: Router,
    caches: Arc<CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clients: ClientRegistry,
    state: RwLock<WorkerState>,
    revalidations: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("static_name", &self.static_name)
            .field("dynamic_name", &self.dynamic_name)
            .field("scope", &self.scope.as_str())
            .field("router", &self.router)
            .finish()
    }
}

impl CacheManager {
    pub fn new(
        config: &SyncConfig,
        manifest: StaticAssetManifest,
        fetcher: Arc<dyn Fetcher>,
        caches: Arc<CacheStorage>,
    ) -> Result<Self, SyncError> {
        let scope = Url::parse(&config.app_scope)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.app_scope, e)))?;
        Ok(Self {
            static_name: config.static_cache_name(),
            dynamic_name: config.dynamic_cache_name.clone(),
            sync_tag: config.sync_tag.clone(),
            scope,
            manifest,
            router: Router::standard(&config.remote_origins),
            caches,
            fetcher,
            clients: ClientRegistry::new(),
            state: RwLock::new(WorkerState::Parsed),
            revalidations: Mutex::new(Vec::new()),
        })
    }

    /// Replace the routing table
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn caches(&self) -> &Arc<CacheStorage> {
        &self.caches
    }

    pub fn static_cache_name(&self) -> &str {
        &self.static_name
    }

    pub fn dynamic_cache_name(&self) -> &str {
        &self.dynamic_name
    }

    async fn set_state(&self, next: WorkerState) -> Result<(), SyncError> {
        let mut state = self.state.write().await;
        *state = state.transition(next)?;
        tracing::debug!("[Worker] State is now {}", next);
        Ok(())
    }

    // ========== Lifecycle ==========

    /// Populate a fresh static generation from the manifest
    pub async fn install(&self) -> Result<(), SyncError> {
        self.set_state(WorkerState::Installing).await?;
        tracing::info!("[Cache] Installing generation {}", self.static_name);
        let cache = self.caches.open(&self.static_name).await;

        let batch = match self.precache(&self.manifest).await {
            Ok(batch) => Ok(batch),
            Err(failure) if failure.only_sounds() => {
                tracing::warn!(
                    "[Cache] Sound assets failed to precache ({}), retrying without sounds",
                    failure.failed.join(", ")
                );
                self.precache(&self.manifest.without_sounds()).await
            }
            Err(failure) => Err(failure),
        };

        match batch {
            Ok(batch) => {
                let count = batch.len();
                cache.put_all(batch).await;
                tracing::info!("[Cache] Precached {} assets", count);
            }
            Err(failure) => {
                if cache.is_empty().await {
                    self.caches.delete(&self.static_name).await;
                }
                self.set_state(WorkerState::Redundant).await?;
                tracing::error!(
                    "[Cache] Install failed, could not precache: {}",
                    failure.failed.join(", ")
                );
                return Err(SyncError::network(format!(
                    "precache failed for {}",
                    failure.failed.join(", ")
                )));
            }
        }

        self.precache_cross_origin(&cache).await;
        self.set_state(WorkerState::Installed).await
    }

    /// Whether an older static generation is still serving clients
    pub async fn has_predecessor(&self) -> bool {
        self.caches
            .keys()
            .await
            .iter()
            .any(|name| name.starts_with(STATIC_CACHE_PREFIX) && *name != self.static_name)
    }

    /// Delete stale generations and take over every client
    pub async fn activate(&self) -> Result<(), SyncError> {
        self.set_state(WorkerState::Activating).await?;
        for name in self.caches.keys().await {
            if name != self.static_name && name != self.dynamic_name {
                self.caches.delete(&name).await;
                tracing::info!("[Cache] Deleted stale generation {}", name);
            }
        }
        self.set_state(WorkerState::Activated).await?;
        self.clients.claim();
        tracing::info!("[Cache] Generation {} active", self.static_name);
        Ok(())
    }

    /// Activate now if installed and waiting; otherwise nothing to do
    pub async fn skip_waiting(&self) -> Result<(), SyncError> {
        if self.state().await == WorkerState::Installed {
            self.activate().await
        } else {
            tracing::debug!("[Worker] Skip waiting ignored in state {}", self.state().await);
            Ok(())
        }
    }

    // ========== Messages and sync ==========

    pub async fn handle_message(&self, message: WorkerMessage) -> Result<(), SyncError> {
        match message {
            WorkerMessage::SkipWaiting => self.skip_waiting().await,
            WorkerMessage::CacheUrls { urls } => {
                let cached = self.cache_urls(&urls).await;
                tracing::info!("[Cache] Cached {}/{} requested URLs", cached, urls.len());
                Ok(())
            }
        }
    }

    /// Fetch and store the given URLs in the static generation
    pub async fn cache_urls(&self, urls: &[String]) -> usize {
        let cache = self.caches.open(&self.static_name).await;
        let mut cached = 0;
        for raw in urls {
            let request = match self.scope.join(raw) {
                Ok(url) => Request::from_url(url),
                Err(e) => {
                    tracing::warn!("[Cache] Cannot cache {}: {}", raw, e);
                    continue;
                }
            };
            match self.fetcher.fetch(&request).await {
                Ok(response) if response.ok() => {
                    cache.put(&request, response).await;
                    cached += 1;
                }
                Ok(response) => {
                    tracing::warn!("[Cache] Cannot cache {}: HTTP {}", raw, response.status());
                }
                Err(e) => tracing::warn!("[Cache] Cannot cache {}: {}", raw, e),
            }
        }
        cached
    }

    /// Background sync event; returns how many clients were told to drain
    pub fn handle_sync(&self, tag: &str) -> usize {
        if tag != self.sync_tag {
            tracing::debug!("[Worker] Ignoring sync tag {}", tag);
            return 0;
        }
        let notified = self.clients.post_all(ClientMessage::ProcessPendingDeletions);
        tracing::info!("[Worker] Asked {} clients to process pending deletions", notified);
        notified
    }

    // ========== Fetch ==========

    /// Answer a request. Never fails; the last resort is a 503.
    pub async fn handle_fetch(&self, request: &Request) -> Response {
        if request.method() != Method::Get || !self.state().await.is_active() {
            return self.passthrough(request).await;
        }
        match self.router.classify(request) {
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NavigationNetworkFirst => self.navigation(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    /// Wait for background revalidations started so far
    pub async fn settle(&self) {
        let pending: Vec<JoinHandle<()>> = lock(&self.revalidations).drain(..).collect();
        for handle in pending {
            let _ = handle.await;
        }
    }

    async fn passthrough(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("[Cache] Uncontrolled fetch of {} failed: {}", request.url(), e);
                Response::service_unavailable()
            }
        }
    }

    async fn network_first(&self, request: &Request) -> Response {
        match self.fetch_and_store(request).await {
            Some(response) => response,
            None => self
                .caches
                .match_request(request)
                .await
                .unwrap_or_else(Response::service_unavailable),
        }
    }

    async fn cache_first(&self, request: &Request) -> Response {
        if let Some(hit) = self.caches.match_request(request).await {
            return hit;
        }
        self.fetch_and_store(request)
            .await
            .unwrap_or_else(Response::service_unavailable)
    }

    async fn navigation(&self, request: &Request) -> Response {
        if let Some(response) = self.fetch_and_store(request).await {
            return response;
        }
        if let Some(hit) = self.caches.match_request(request).await {
            return hit;
        }

        let fallbacks: Vec<&str> = if self.is_root_level(request) {
            vec![self.manifest.shell.as_str(), "/"]
        } else {
            vec![self.manifest.not_found.as_str()]
        };
        for path in fallbacks {
            if let Some(page) = self.match_scoped(path).await {
                tracing::debug!("[Cache] Offline navigation to {} served {}", request.path(), path);
                return page;
            }
        }
        Response::service_unavailable()
    }

    async fn stale_while_revalidate(&self, request: &Request) -> Response {
        match self.caches.find(request).await {
            Some((source, hit)) => {
                self.spawn_revalidation(request.clone(), source);
                hit
            }
            None => self
                .fetch_and_store(request)
                .await
                .unwrap_or_else(Response::service_unavailable),
        }
    }

    /// Network fetch; OK responses are copied into the dynamic generation
    /// unless the request is no-store. `None` only on transport failure.
    async fn fetch_and_store(&self, request: &Request) -> Option<Response> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.ok() && request.cache() != CacheMode::NoStore {
                    self.caches
                        .open(&self.dynamic_name)
                        .await
                        .put(request, response.clone())
                        .await;
                }
                Some(response)
            }
            Err(e) => {
                tracing::debug!("[Cache] Network fetch of {} failed: {}", request.url(), e);
                None
            }
        }
    }

    fn spawn_revalidation(&self, request: Request, target: Arc<Cache>) {
        let fetcher = self.fetcher.clone();
        let handle = tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) if response.ok() => target.put(&request, response).await,
                Ok(response) => tracing::debug!(
                    "[Cache] Revalidation of {} returned HTTP {}",
                    request.url(),
                    response.status()
                ),
                Err(e) => tracing::debug!("[Cache] Revalidation of {} failed: {}", request.url(), e),
            }
        });
        let mut pending = lock(&self.revalidations);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    async fn precache(
        &self,
        manifest: &StaticAssetManifest,
    ) -> Result<Vec<(Request, Response)>, PrecacheFailure> {
        let requests = manifest.asset_requests(&self.scope);
        let results = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        let mut batch = Vec::with_capacity(requests.len());
        let mut failed = Vec::new();
        for (request, result) in requests.into_iter().zip(results) {
            match result {
                Ok(response) if response.ok() => batch.push((request, response)),
                Ok(response) => {
                    tracing::debug!("[Cache] {} returned HTTP {}", request.url(), response.status());
                    failed.push(request.url().to_string());
                }
                Err(e) => {
                    tracing::debug!("[Cache] {} failed: {}", request.url(), e);
                    failed.push(request.url().to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(batch)
        } else {
            Err(PrecacheFailure { failed })
        }
    }

    async fn precache_cross_origin(&self, cache: &Cache) {
        for request in self.manifest.cross_origin_requests() {
            let request = request.with_cache(CacheMode::Reload);
            match self.fetcher.fetch(&request).await {
                Ok(response) if response.ok() => cache.put(&request, response).await,
                Ok(response) => tracing::warn!(
                    "[Cache] Cross-origin asset {} returned HTTP {}",
                    request.url(),
                    response.status()
                ),
                Err(e) => tracing::warn!("[Cache] Cross-origin asset {} failed: {}", request.url(), e),
            }
        }
    }

    /// Path sits directly under the scope (e.g. `/`, `/play`), or is the
    /// scope path itself without its trailing slash
    fn is_root_level(&self, request: &Request) -> bool {
        let base = self.scope.path();
        if request.path() == base.trim_end_matches('/') {
            return true;
        }
        match request.path().strip_prefix(base) {
            Some(rest) => !rest.trim_end_matches('/').contains('/'),
            None => false,
        }
    }

    async fn match_scoped(&self, path: &str) -> Option<Response> {
        let url = self.scope.join(path.trim_start_matches('/')).ok()?;
        self.caches.match_request(&Request::from_url(url)).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
