//! Open page connections controlled by the worker.
//!
//! Pages subscribe to a broadcast channel; the worker never shares memory
//! with them, it only posts `ClientMessage` values.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::shared::message::ClientMessage;

const CHANNEL_CAPACITY: usize = 64;

/// Broadcast fan-out to every open client
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    sender: broadcast::Sender<ClientMessage>,
    claimed: Arc<AtomicBool>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connect a client
    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.sender.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Post to every client; returns how many received it
    pub fn post_all(&self, message: ClientMessage) -> usize {
        match self.sender.send(message) {
            Ok(count) => count,
            Err(_) => {
                tracing::debug!("[Worker] No open clients to notify");
                0
            }
        }
    }

    /// Take control of every open client
    pub fn claim(&self) {
        self.claimed.store(true, Ordering::SeqCst);
        tracing::info!("[Worker] Claimed {} open clients", self.client_count());
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
