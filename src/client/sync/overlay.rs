//! Offline overlay collaborator.
//!
//! The game UI owns the actual DOM; this layer only tells it when to block
//! input and what transient notices to flash.

/// Severity of a transient notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

/// UI surface driven by the status broadcaster
pub trait OfflineOverlay: Send + Sync {
    /// Show the blocking offline overlay (with its retry affordance)
    fn show(&self);

    /// Hide the blocking offline overlay
    fn hide(&self);

    /// Flash a transient notification
    fn toast(&self, message: &str, kind: ToastKind);
}

/// Overlay that only logs, for headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOverlay;

impl OfflineOverlay for TracingOverlay {
    fn show(&self) {
        tracing::warn!("[Overlay] Offline overlay shown");
    }

    fn hide(&self) {
        tracing::info!("[Overlay] Offline overlay hidden");
    }

    fn toast(&self, message: &str, kind: ToastKind) {
        match kind {
            ToastKind::Success => tracing::info!("[Overlay] {}", message),
            ToastKind::Error => tracing::warn!("[Overlay] {}", message),
        }
    }
}
