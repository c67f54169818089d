//! Table of in-flight submissions that can be cancelled by id

use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Cancellation handles keyed by session id
#[derive(Clone, Default)]
pub struct SessionTracker {
    active: Arc<DashMap<Uuid, CancellationToken>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; it stays listed until the guard is dropped
    pub fn register(&self, id: Uuid) -> (CancellationToken, SessionGuard) {
        let token = CancellationToken::new();
        self.active.insert(id, token.clone());
        let guard = SessionGuard {
            id,
            active: Arc::clone(&self.active),
        };
        (token, guard)
    }

    /// Cancel a session. Returns false when no such session is in flight.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.active.remove(id) {
            Some((_, token)) => {
                token.cancel();
                debug!(session = %id, "Session cancelled");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.active.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Removes its session from the tracker when dropped
pub struct SessionGuard {
    id: Uuid,
    active: Arc<DashMap<Uuid, CancellationToken>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}
