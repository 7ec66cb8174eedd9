//! Platform Capabilities
//!
//! A single value object describing what the host runtime can do. Components
//! receive it at construction and branch on capabilities, never on platform
//! names.

use serde::{Deserialize, Serialize};

/// Host runtime the game is embedded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Plain browser tab or installed PWA
    Web,
    /// Native mobile shell hosting a web view
    NativeShell,
    /// Desktop wrapper (Electron-style) hosting a web view
    DesktopWrapper,
}

impl Platform {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "web" => Some(Self::Web),
            "native" | "native_shell" | "capacitor" => Some(Self::NativeShell),
            "desktop" | "desktop_wrapper" | "electron" => Some(Self::DesktopWrapper),
            _ => None,
        }
    }
}

/// What the host runtime supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Detected host runtime
    pub platform: Platform,
    /// Host `online`/`offline` events can be trusted
    pub link_events_reliable: bool,
    /// Background sync registrations are delivered to the worker
    pub background_sync: bool,
    /// Cache storage API is available
    pub cache_storage: bool,
    /// A background cache worker can be registered
    pub service_worker: bool,
}

impl Capabilities {
    /// Canonical capability table for a platform
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Web => Self {
                platform,
                link_events_reliable: true,
                background_sync: true,
                cache_storage: true,
                service_worker: true,
            },
            Platform::NativeShell => Self {
                platform,
                link_events_reliable: false,
                background_sync: false,
                cache_storage: true,
                service_worker: false,
            },
            Platform::DesktopWrapper => Self {
                platform,
                link_events_reliable: false,
                background_sync: false,
                cache_storage: true,
                service_worker: true,
            },
        }
    }

    /// Detect from `BALLOONPOP_PLATFORM`, falling back to `Web`
    pub fn detect() -> Self {
        let platform = std::env::var("BALLOONPOP_PLATFORM")
            .ok()
            .and_then(|raw| Platform::parse(&raw))
            .unwrap_or(Platform::Web);
        tracing::debug!("[Platform] Detected {:?}", platform);
        Self::for_platform(platform)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::for_platform(Platform::Web)
    }
}
