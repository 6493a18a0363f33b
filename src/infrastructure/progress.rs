//! Per-client progress channels for uploads.
//!
//! Each connected WebSocket subscribes under its client id and forwards
//! whatever arrives on its channel. Uploads publish by id without knowing
//! whether anyone listens.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

struct Channel {
    id: u64,
    sender: UnboundedSender<String>,
}

/// Handed to a subscriber; pass it back to [`ProgressHub::unsubscribe`] so
/// a stale connection never removes the one that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

#[derive(Clone, Default)]
pub struct ProgressHub {
    channels: Arc<DashMap<String, Channel>>,
    next_id: Arc<AtomicU64>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `client_id`, replacing any earlier subscriber. The earlier
    /// receiver sees its channel close.
    pub fn subscribe(&self, client_id: &str) -> (Subscription, UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = unbounded_channel();

        if self.channels.insert(client_id.to_string(), Channel { id, sender }).is_some() {
            debug!(client_id, "progress subscriber replaced");
        }
        (Subscription(id), receiver)
    }

    pub fn unsubscribe(&self, client_id: &str, subscription: Subscription) {
        self.channels.remove_if(client_id, |_, channel| channel.id == subscription.0);
    }

    pub fn is_subscribed(&self, client_id: &str) -> bool {
        self.channels.contains_key(client_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.channels.len()
    }

    /// No-op for unknown ids. A closed channel is dropped.
    pub fn send(&self, client_id: &str, message: impl Into<String>) {
        let delivered = match self.channels.get(client_id) {
            Some(channel) => channel.sender.send(message.into()).is_ok(),
            None => return,
        };

        if !delivered {
            debug!(client_id, "progress subscriber gone, dropping channel");
            self.channels.remove_if(client_id, |_, channel| channel.sender.is_closed());
        }
    }
}
