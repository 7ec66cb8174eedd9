//! Request and response model for the cache worker.
//!
//! Requests carry the metadata routing needs (destination, mode) alongside the
//! URL. Cache identity is the method plus the URL with its fragment removed.

use bytes::Bytes;
use std::collections::BTreeMap;
use url::Url;

use crate::worker::fetch::FetchError;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
        }
    }
}

/// What kind of resource the page asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// Unknown (fetch/XHR)
    #[default]
    Empty,
    Document,
    Style,
    Script,
    Image,
    Font,
    Audio,
    Video,
    Track,
    Manifest,
}

/// Request mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    SameOrigin,
    NoCors,
    #[default]
    Cors,
    /// Full-page navigation
    Navigate,
}

/// How intermediate HTTP caches should treat the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Bypass intermediate caches and refresh them
    Reload,
    /// Bypass intermediate caches entirely
    NoStore,
}

/// An outgoing request seen by the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
    method: Method,
    destination: Destination,
    mode: RequestMode,
    cache: CacheMode,
    headers: BTreeMap<String, String>,
}

impl Request {
    /// GET request for an absolute URL
    pub fn get(url: &str) -> Result<Self, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::InvalidRequest(format!("{}: {}", url, e)))?;
        Ok(Self::from_url(url))
    }

    /// Full-page navigation to an absolute URL
    pub fn navigate(url: &str) -> Result<Self, FetchError> {
        Ok(Self::get(url)?
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document))
    }

    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            method: Method::Get,
            destination: Destination::Empty,
            mode: RequestMode::Cors,
            cache: CacheMode::Default,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn cache(&self) -> CacheMode {
        self.cache
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Cache identity: method plus URL without fragment
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        format!("{} {}", self.method.as_str(), url)
    }
}

/// A response snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Bytes,
    url: Option<String>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
            url: None,
        }
    }

    /// Synthetic 503 returned when neither cache nor network can answer
    pub fn service_unavailable() -> Self {
        Self::new(503, "Offline").with_header("content-type", "text/plain")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// 2xx status
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}
