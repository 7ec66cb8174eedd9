//! # Network Monitor
//!
//! Detects real connectivity independently of the UI.
//!
//! ## Features
//!
//! - **Link Fast-Path**: A host-reported link-down short-circuits without a network call
//! - **Real Round-Trip**: Fetches a tiny well-known resource with a cache-busting parameter
//! - **Bounded**: Every check is abandoned after the configured timeout
//! - **Recovery Loop**: Re-probes on an interval while the app believes it is offline
//! - **Worker Routing**: With a cache worker running, the probe goes through its router

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::client::sync::status::StatusBroadcaster;
use crate::shared::config::SyncConfig;
use crate::shared::error::SyncError;
use crate::worker::request::{CacheMode, Request};
use crate::worker::WorkerHandle;

/// Host-reported link state (e.g. the platform's online flag)
pub trait LinkState: Send + Sync {
    /// Whether the host believes a network link is up
    fn is_link_up(&self) -> bool;
}

/// Link flag updated by host `online`/`offline` events
#[derive(Debug)]
pub struct HostLink {
    up: AtomicBool,
}

impl HostLink {
    pub fn new(up: bool) -> Self {
        Self {
            up: AtomicBool::new(up),
        }
    }

    pub fn set(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

impl LinkState for HostLink {
    fn is_link_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}

/// Performs the probe round-trip
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Fetch `url`; any successful response counts as reachable
    async fn probe(&self, url: &str) -> Result<(), SyncError>;
}

/// Probe transport backed by `reqwest`
#[derive(Debug, Clone, Default)]
pub struct HttpProbeTransport {
    client: reqwest::Client,
}

impl HttpProbeTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProbeTransport for HttpProbeTransport {
    async fn probe(&self, url: &str) -> Result<(), SyncError> {
        let response = self.client.get(url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SyncError::network(format!("probe returned {}", response.status())))
        }
    }
}

/// Probe transport that sends the check through the cache worker.
///
/// The request is marked no-store so cache-busted probes never accumulate in
/// the dynamic cache. Any non-OK answer, including the worker's offline 503,
/// is a failure.
#[derive(Debug, Clone)]
pub struct WorkerProbeTransport {
    worker: WorkerHandle,
}

impl WorkerProbeTransport {
    pub fn new(worker: WorkerHandle) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl ProbeTransport for WorkerProbeTransport {
    async fn probe(&self, url: &str) -> Result<(), SyncError> {
        let request = Request::get(url)
            .map_err(|e| SyncError::network(e.to_string()))?
            .with_cache(CacheMode::NoStore);
        let response = self.worker.fetch(request).await?;
        if response.ok() {
            Ok(())
        } else {
            Err(SyncError::network(format!("probe returned HTTP {}", response.status())))
        }
    }
}

/// Connectivity probe
pub struct NetworkProbe {
    probe_url: String,
    timeout: Duration,
    trust_link_state: bool,
    transport: Arc<dyn ProbeTransport>,
    link: Arc<dyn LinkState>,
    last_success: RwLock<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for NetworkProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkProbe")
            .field("probe_url", &self.probe_url)
            .field("timeout", &self.timeout)
            .field("trust_link_state", &self.trust_link_state)
            .finish()
    }
}

impl NetworkProbe {
    /// Create a probe; `trust_link_state` enables the link-down fast path
    pub fn new(
        config: &SyncConfig,
        trust_link_state: bool,
        transport: Arc<dyn ProbeTransport>,
        link: Arc<dyn LinkState>,
    ) -> Self {
        Self {
            probe_url: config.probe_url.clone(),
            timeout: config.probe_timeout,
            trust_link_state,
            transport,
            link,
            last_success: RwLock::new(None),
        }
    }

    /// Host-reported link state
    pub fn link_up(&self) -> bool {
        self.link.is_link_up()
    }

    /// Check real connectivity. Never errors; every failure path is `false`.
    pub async fn check_connectivity(&self) -> bool {
        if self.trust_link_state && !self.link.is_link_up() {
            tracing::debug!("[Probe] Host reports link down, skipping network check");
            return false;
        }

        let url = cache_busted(&self.probe_url);
        match tokio::time::timeout(self.timeout, self.transport.probe(&url)).await {
            Ok(Ok(())) => {
                *self.last_success.write().await = Some(Utc::now());
                tracing::debug!("[Probe] Connectivity confirmed");
                true
            }
            Ok(Err(e)) => {
                tracing::debug!("[Probe] Connectivity check failed: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!("[Probe] Connectivity check timed out after {:?}", self.timeout);
                false
            }
        }
    }

    /// Timestamp of the last successful check
    pub async fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read().await
    }

    /// Re-probe every `interval` while `status` is offline
    pub fn spawn_recovery_loop(
        self: Arc<Self>,
        status: Arc<StatusBroadcaster>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if status.is_online() {
                    continue;
                }
                if self.check_connectivity().await {
                    tracing::info!("[Probe] Connectivity recovered");
                    status.set_online();
                }
            }
        })
    }
}

fn cache_busted(base: &str) -> String {
    let stamp = Utc::now().timestamp_millis().to_string();
    match url::Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("_", &stamp);
            url.to_string()
        }
        Err(_) => {
            let sep = if base.contains('?') { '&' } else { '?' };
            format!("{}{}_={}", base, sep, stamp)
        }
    }
}
