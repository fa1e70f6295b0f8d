use crate::network::{NodeId, Packet};
use log::error;
use std::collections::HashMap;
use std::sync::Mutex;

/// Per-sender inboxes of delivered application packets.
pub struct MessageQueue {
    inner: Mutex<HashMap<NodeId, Vec<Packet>>>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> MessageQueue {
        MessageQueue {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Appends `packet` to its sender's inbox.
    pub fn enqueue(&self, packet: Packet) {
        match self.inner.lock() {
            Ok(mut queue) => queue
                .entry(packet.source_id.clone())
                .or_default()
                .push(packet),
            Err(_) => {
                error!("Failed to acquire lock on message queue");
            }
        }
    }

    /// Takes everything queued from `peer_id`. Reading and clearing happen
    /// under the same lock, so nothing enqueued concurrently is lost.
    pub fn drain(&self, peer_id: &NodeId) -> Vec<Packet> {
        match self.inner.lock() {
            Ok(mut queue) => queue.remove(peer_id).unwrap_or_default(),
            Err(_) => {
                error!("Failed to acquire lock on message queue");
                Vec::new()
            }
        }
    }

    /// Senders with at least one queued packet.
    pub fn senders(&self) -> Vec<NodeId> {
        match self.inner.lock() {
            Ok(queue) => queue.keys().cloned().collect(),
            Err(_) => {
                error!("Failed to acquire lock on message queue");
                Vec::new()
            }
        }
    }

    pub fn pending(&self, peer_id: &NodeId) -> usize {
        match self.inner.lock() {
            Ok(queue) => queue.get(peer_id).map_or(0, Vec::len),
            Err(_) => {
                error!("Failed to acquire lock on message queue");
                0
            }
        }
    }
}
