//! # Cache Storage
//!
//! Named cache generations holding request/response snapshots.
//!
//! ## Features
//!
//! - **Named Generations**: `open` creates a generation on first use
//! - **Keyed by Request**: entries are keyed by method plus normalized URL
//! - **Atomic Batches**: `put_all` stores a whole batch or nothing
//! - **Cross-Generation Match**: `CacheStorage::match_request` searches every generation

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::worker::request::{Request, Response};

#[derive(Debug, Clone)]
struct CacheEntry {
    response: Response,
    stored_at: DateTime<Utc>,
}

/// One named generation
#[derive(Debug)]
pub struct Cache {
    name: String,
    entries: RwLock<BTreeMap<String, CacheEntry>>,
}

impl Cache {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored response for `request`, if any
    pub async fn match_request(&self, request: &Request) -> Option<Response> {
        self.entries
            .read()
            .await
            .get(&request.cache_key())
            .map(|entry| entry.response.clone())
    }

    /// When the entry for `request` was last written
    pub async fn stored_at(&self, request: &Request) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .await
            .get(&request.cache_key())
            .map(|entry| entry.stored_at)
    }

    /// Store `response` for `request`, replacing any previous entry
    pub async fn put(&self, request: &Request, response: Response) {
        self.entries.write().await.insert(
            request.cache_key(),
            CacheEntry {
                response,
                stored_at: Utc::now(),
            },
        );
    }

    /// Store a batch under a single write lock
    pub async fn put_all(&self, batch: Vec<(Request, Response)>) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        for (request, response) in batch {
            entries.insert(
                request.cache_key(),
                CacheEntry {
                    response,
                    stored_at: now,
                },
            );
        }
    }

    /// Remove the entry for `request`; returns whether one existed
    pub async fn delete(&self, request: &Request) -> bool {
        self.entries.write().await.remove(&request.cache_key()).is_some()
    }

    /// Cache keys of every stored entry
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// All generations known to the worker
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: RwLock<BTreeMap<String, Arc<Cache>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a generation, creating it if needed
    pub async fn open(&self, name: &str) -> Arc<Cache> {
        if let Some(cache) = self.caches.read().await.get(name) {
            return cache.clone();
        }
        self.caches
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Cache::new(name)))
            .clone()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.caches.read().await.contains_key(name)
    }

    /// Delete a generation; returns whether it existed
    pub async fn delete(&self, name: &str) -> bool {
        self.caches.write().await.remove(name).is_some()
    }

    /// Names of every generation
    pub async fn keys(&self) -> Vec<String> {
        self.caches.read().await.keys().cloned().collect()
    }

    /// First stored response for `request` across all generations
    pub async fn match_request(&self, request: &Request) -> Option<Response> {
        self.find(request).await.map(|(_, response)| response)
    }

    /// Like `match_request`, also returning the generation that held it
    pub async fn find(&self, request: &Request) -> Option<(Arc<Cache>, Response)> {
        let caches: Vec<Arc<Cache>> = self.caches.read().await.values().cloned().collect();
        for cache in caches {
            if let Some(response) = cache.match_request(request).await {
                return Some((cache, response));
            }
        }
        None
    }
}
