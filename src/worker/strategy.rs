//! Request classification.
//!
//! An ordered table of (predicate, strategy) routes evaluated top-down; the
//! first matching route wins and unmatched requests use the fallback.

use std::fmt;

use crate::worker::request::{Destination, Request};

/// How a request reconciles cache and network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Network, then any stored copy, then 503
    NetworkFirst,
    /// Stored copy, then network, then 503
    CacheFirst,
    /// Network, then stored copy, then the app shell or not-found page
    NavigationNetworkFirst,
    /// Stored copy now with a background refresh; network on a miss
    StaleWhileRevalidate,
}

type Predicate = Box<dyn Fn(&Request) -> bool + Send + Sync>;

struct Route {
    name: &'static str,
    predicate: Predicate,
    strategy: Strategy,
}

/// Ordered routing table
pub struct Router {
    routes: Vec<Route>,
    fallback: Strategy,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field(
                "routes",
                &self
                    .routes
                    .iter()
                    .map(|r| (r.name, r.strategy))
                    .collect::<Vec<_>>(),
            )
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// File extensions served cache-first as media
const MEDIA_EXTENSIONS: [&str; 8] = ["mp3", "wav", "ogg", "m4a", "aac", "mp4", "webm", "oga"];

impl Router {
    /// Empty table answering every request with `fallback`
    pub fn new(fallback: Strategy) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    /// Append a route; earlier routes take priority
    pub fn route<F>(mut self, name: &'static str, predicate: F, strategy: Strategy) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.routes.push(Route {
            name,
            predicate: Box::new(predicate),
            strategy,
        });
        self
    }

    /// Remote origins, then media, then navigations, else stale-while-revalidate
    pub fn standard(remote_origins: &[String]) -> Self {
        let origins = remote_origins.to_vec();
        Self::new(Strategy::StaleWhileRevalidate)
            .route(
                "remote-origin",
                move |request| is_remote_origin(request, &origins),
                Strategy::NetworkFirst,
            )
            .route("media", is_media, Strategy::CacheFirst)
            .route("navigation", Request::is_navigation, Strategy::NavigationNetworkFirst)
    }

    pub fn classify(&self, request: &Request) -> Strategy {
        self.routes
            .iter()
            .find(|route| (route.predicate)(request))
            .map(|route| route.strategy)
            .unwrap_or(self.fallback)
    }
}

/// Host equals one of `origins` or is a subdomain of one
pub fn is_remote_origin(request: &Request, origins: &[String]) -> bool {
    let Some(host) = request.host() else {
        return false;
    };
    origins.iter().any(|origin| {
        host == origin
            || host
                .strip_suffix(origin.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Audio or video by destination or file extension
pub fn is_media(request: &Request) -> bool {
    if matches!(
        request.destination(),
        Destination::Audio | Destination::Video | Destination::Track
    ) {
        return true;
    }
    has_media_extension(request.path())
}

pub(crate) fn has_media_extension(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
