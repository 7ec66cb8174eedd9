//! Network access for the cache worker.
//!
//! Mirrors browser fetch semantics: any HTTP status is a response, only a
//! transport failure is an error.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::worker::request::{CacheMode, Method, Request, Response};

/// Fetch failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Performs network requests on behalf of the worker
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Fetcher backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        let mut builder = self
            .client
            .request(method, request.url().clone())
            .timeout(self.timeout);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if matches!(request.cache(), CacheMode::Reload | CacheMode::NoStore) {
            builder = builder
                .header("cache-control", "no-cache")
                .header("pragma", "no-cache");
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = if request.method() == Method::Head {
            bytes::Bytes::new()
        } else {
            response
                .bytes()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?
        };

        let mut snapshot = Response::new(status, body).with_url(url);
        for (name, value) in headers {
            snapshot = snapshot.with_header(name, value);
        }
        Ok(snapshot)
    }
}
