/**
 * Remote Deletion Client
 *
 * Deletes uploaded images from the remote object store. The store connection
 * is initialized lazily on first use; concurrent first callers share a single
 * in-flight initialization. Deleting an object that no longer exists is a
 * success, since absence is the state we wanted.
 */
use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::shared::config::SyncConfig;
use crate::shared::error::SyncError;

/// Host that marks a URL as an object-store download URL
const STORAGE_HOST_MARKER: &str = "firebasestorage.googleapis.com";

/// Characters left unescaped in an object name path segment
const OBJECT_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors reported by an object store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("object not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Backend error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "storage/object-not-found",
            Self::Unauthorized => "storage/unauthorized",
            Self::Http { .. } => "storage/unknown",
            Self::Transport(_) => "storage/retry-limit-exceeded",
        }
    }
}

/// What a successful delete found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The object existed and was removed
    Deleted,
    /// The object was already gone
    AlreadyAbsent,
}

/// Remote object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Delete the object at `path`
    async fn delete_object(&self, path: &str) -> Result<(), RemoteError>;
}

/// Opens an object store connection
#[async_trait]
pub trait ObjectStoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ObjectStore>, SyncError>;
}

/// Firebase Storage over its REST API
#[derive(Debug, Clone)]
pub struct FirebaseStorage {
    client: reqwest::Client,
    api_base: String,
    bucket: String,
}

impl FirebaseStorage {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/v0/b/{}/o/{}",
            self.api_base,
            self.bucket,
            utf8_percent_encode(path, OBJECT_NAME)
        )
    }
}

#[async_trait]
impl ObjectStore for FirebaseStorage {
    async fn delete_object(&self, path: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(self.object_url(path))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            404 => Err(RemoteError::NotFound),
            401 | 403 => Err(RemoteError::Unauthorized),
            code => {
                let body = response.text().await.unwrap_or_default();
                Err(RemoteError::Http { status: code, body })
            }
        }
    }
}

/// Connector for [`FirebaseStorage`] built from configuration
#[derive(Debug, Clone)]
pub struct FirebaseConnector {
    api_base: String,
    bucket: Option<String>,
}

impl FirebaseConnector {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            api_base: config.storage_api_base.clone(),
            bucket: config.storage_bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStoreConnector for FirebaseConnector {
    async fn connect(&self) -> Result<Arc<dyn ObjectStore>, SyncError> {
        let bucket = self
            .bucket
            .clone()
            .ok_or_else(|| SyncError::not_configured("storage_bucket"))?;
        let client = reqwest::Client::builder().build()?;
        tracing::info!("[Remote] Connected to object store bucket {}", bucket);
        Ok(Arc::new(FirebaseStorage::new(client, self.api_base.clone(), bucket)))
    }
}

/// Lazily-connected deletion client
pub struct RemoteDeletionClient {
    connector: Arc<dyn ObjectStoreConnector>,
    store: OnceCell<Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for RemoteDeletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDeletionClient")
            .field("connected", &self.store.initialized())
            .finish()
    }
}

impl RemoteDeletionClient {
    pub fn new(connector: Arc<dyn ObjectStoreConnector>) -> Self {
        Self {
            connector,
            store: OnceCell::new(),
        }
    }

    /// Delete `target`; not-found counts as success
    pub async fn delete_remote(&self, target: &str) -> Result<DeleteOutcome, SyncError> {
        let store = self
            .store
            .get_or_try_init(|| self.connector.connect())
            .await?;

        match store.delete_object(target).await {
            Ok(()) => {
                tracing::info!("[Remote] Deleted {}", target);
                Ok(DeleteOutcome::Deleted)
            }
            Err(RemoteError::NotFound) => {
                tracing::info!("[Remote] {} already deleted", target);
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => {
                tracing::debug!("[Remote] Delete of {} failed: {}", target, e);
                Err(SyncError::remote(e.code(), e.to_string()))
            }
        }
    }
}

/// Extract the object path from a storage download URL.
///
/// `https://firebasestorage.googleapis.com/v0/b/app/o/imgs%2Fa.png?alt=media`
/// yields `imgs/a.png`. URLs of any other shape yield `None`.
pub fn storage_path_from_url(url: &str) -> Option<String> {
    if !url.contains(STORAGE_HOST_MARKER) {
        return None;
    }
    let (_, rest) = url.split_once("/o/")?;
    let encoded = rest.split(|c| c == '?' || c == '#').next()?;
    if encoded.is_empty() {
        return None;
    }
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|path| path.into_owned())
}
