//! Client registry
//!
//! The set of joined connections and the broadcast over them. Membership
//! changes and broadcasts share one lock, so a broadcast always fans out
//! over a stable set.

use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::client::{Connection, ConnectionId};

/// Registry of connections that completed the username handshake.
///
/// Holds shared references only; sessions own their connections' lifetimes.
pub struct Registry {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `conn`. Returns `false` if it was already present.
    pub async fn add(&self, conn: Arc<Connection>) -> bool {
        let mut connections = self.connections.lock().await;
        if connections.contains_key(&conn.id()) {
            return false;
        }
        connections.insert(conn.id(), conn);
        true
    }

    /// Deregisters the connection. Removing an absent entry is a no-op.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        self.connections.lock().await.remove(&id).is_some()
    }

    /// Sends `message` to every registered connection except `exclude`.
    ///
    /// Each send is best-effort: a failing recipient is logged and skipped,
    /// never removed here. Its own session notices the failure and leaves.
    /// Returns the number of recipients the line was written to.
    ///
    /// The lock is held for the whole fan-out, so a stalled recipient delays
    /// other broadcasts for at most the connection write timeout.
    pub async fn broadcast(&self, message: &str, exclude: Option<ConnectionId>) -> usize {
        let connections = self.connections.lock().await;
        let mut delivered = 0;

        for (id, conn) in connections.iter() {
            if Some(*id) == exclude {
                continue;
            }
            match conn.send(message).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Failed to deliver to connection {}: {}", id, e),
            }
        }

        delivered
    }

    /// Current members, taken under the lock.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.lock().await.values().cloned().collect()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
