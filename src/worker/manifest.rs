/**
 * Static Asset Manifest
 *
 * Build-time list of resources precached on install, plus the cross-origin
 * resources cached best-effort. Same-origin entries are paths resolved
 * against the worker scope. The manifest never changes at runtime.
 */
use url::Url;

use crate::worker::request::{CacheMode, Request};
use crate::worker::strategy::has_media_extension;

/// Same-origin assets of the game
const GAME_ASSETS: [&str; 19] = [
    "/",
    "/index.html",
    "/404.html",
    "/manifest.json",
    "/css/styles.css",
    "/css/animations.css",
    "/js/app.js",
    "/js/game.js",
    "/js/platform.js",
    "/js/audio.js",
    "/js/offline-manager.js",
    "/images/balloon.png",
    "/images/icon-192.png",
    "/images/icon-512.png",
    "/fonts/fredoka-one.woff2",
    "/sounds/pop.mp3",
    "/sounds/correct.mp3",
    "/sounds/wrong.mp3",
    "/sounds/background.mp3",
];

/// Cross-origin assets of the game
const CROSS_ORIGIN_ASSETS: [&str; 2] = [
    "https://fonts.googleapis.com/css2?family=Fredoka+One&display=swap",
    "https://www.gstatic.com/firebasejs/9.22.0/firebase-app-compat.js",
];

/// Precache manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAssetManifest {
    /// Same-origin paths, in precache order
    pub assets: Vec<String>,
    /// Absolute cross-origin URLs
    pub cross_origin: Vec<String>,
    /// Application shell served for root-level navigations when offline
    pub shell: String,
    /// Page served for other navigations when offline
    pub not_found: String,
}

impl StaticAssetManifest {
    pub fn new(assets: Vec<String>, cross_origin: Vec<String>) -> Self {
        Self {
            assets,
            cross_origin,
            shell: "/index.html".to_string(),
            not_found: "/404.html".to_string(),
        }
    }

    /// The game's shipped manifest
    pub fn balloon_pop() -> Self {
        Self::new(
            GAME_ASSETS.iter().map(|s| s.to_string()).collect(),
            CROSS_ORIGIN_ASSETS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Copy with sound assets removed
    pub fn without_sounds(&self) -> Self {
        Self {
            assets: self
                .assets
                .iter()
                .filter(|asset| !is_sound_asset(asset))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    pub fn has_sounds(&self) -> bool {
        self.assets.iter().any(|asset| is_sound_asset(asset))
    }

    /// Same-origin precache requests, bypassing intermediate caches
    pub fn asset_requests(&self, scope: &Url) -> Vec<Request> {
        self.assets
            .iter()
            .filter_map(|asset| resolve(scope, asset))
            .collect()
    }

    /// Cross-origin precache requests
    pub fn cross_origin_requests(&self) -> Vec<Request> {
        self.cross_origin
            .iter()
            .filter_map(|url| match Request::get(url) {
                Ok(request) => Some(request),
                Err(e) => {
                    tracing::warn!("[Cache] Skipping cross-origin asset: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl Default for StaticAssetManifest {
    fn default() -> Self {
        Self::balloon_pop()
    }
}

/// Sound effects and music
pub fn is_sound_asset(locator: &str) -> bool {
    let path = locator.split(|c| c == '?' || c == '#').next().unwrap_or(locator);
    path.contains("/sounds/") || has_media_extension(path)
}

fn resolve(scope: &Url, asset: &str) -> Option<Request> {
    match scope.join(asset.trim_start_matches('/')) {
        Ok(url) => Some(Request::from_url(url).with_cache(CacheMode::Reload)),
        Err(e) => {
            tracing::warn!("[Cache] Bad manifest entry {}: {}", asset, e);
            None
        }
    }
}
