//! Broadcast hub: registry of live sessions.
//!
//! Each registered session owns the receiving half of an unbounded channel;
//! the hub keeps the sending half. `broadcast` pushes one event to every
//! registered session. A send only fails when the receiver is gone, in which
//! case that session is pruned and delivery to the others carries on.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

pub type SessionId = Uuid;

/// Out-of-band notification pushed to sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubEvent {
    VocabularyUpdated { new_entries: usize, vocab_size: u64 },
}

#[derive(Default)]
pub struct BroadcastHub {
    sessions: RwLock<HashMap<SessionId, mpsc::UnboundedSender<HubEvent>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: SessionId, sender: mpsc::UnboundedSender<HubEvent>) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);
        tracing::debug!(session = %id, "session registered");
    }

    /// Returns false when `id` was not registered (already pruned, say).
    pub fn deregister(&self, id: SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            tracing::debug!(session = %id, "session deregistered");
        }
        removed
    }

    /// Register a fresh session; it is deregistered when the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(id, tx);
        Subscription {
            id,
            events: rx,
            hub: Arc::clone(self),
        }
    }

    /// Deliver `event` to every registered session. Returns how many got it.
    pub fn broadcast(&self, event: &HubEvent) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            for (id, sender) in sessions.iter() {
                match sender.send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(_) => dead.push(*id),
                }
            }
        }

        if !dead.is_empty() {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            for id in &dead {
                sessions.remove(id);
                tracing::warn!(session = %id, "pruned disconnected session during broadcast");
            }
        }

        tracing::debug!(delivered, pruned = dead.len(), ?event, "broadcast complete");
        delivered
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A session's registration with the hub.
pub struct Subscription {
    id: SessionId,
    events: mpsc::UnboundedReceiver<HubEvent>,
    hub: Arc<BroadcastHub>,
}

impl Subscription {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait for the next event. `None` once the hub has dropped this session.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.deregister(self.id);
    }
}
