//! Library sync fan-out.

use std::collections::HashMap;

use mangahub_shared::{LibraryEvent, SyncStats, SyncWelcome};
use tokio::sync::Mutex;

use crate::connection::{Connection, ConnectionError, ConnectionHandle, ConnectionId, Transport};

/// Broadcasts every [`LibraryEvent`] to all live TCP and WebSocket subscribers.
///
/// There is no per-user filtering: each subscriber sees every event. The hub
/// lock is held for the whole fan-out so concurrent broadcasts reach every
/// subscriber in the same order.
#[derive(Default)]
pub struct SyncHub {
    clients: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl SyncHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, conn: ConnectionHandle) {
        let id = conn.id();
        self.clients.lock().await.insert(id, conn);
        tracing::debug!(%id, "sync subscriber registered");
    }

    /// Removes and closes the connection. Unknown ids are ignored.
    pub async fn unregister(&self, id: ConnectionId) {
        let removed = self.clients.lock().await.remove(&id);
        if let Some(conn) = removed {
            if let Err(e) = conn.close().await {
                tracing::debug!(%id, "error closing sync subscriber: {}", e);
            }
            tracing::debug!(%id, "sync subscriber unregistered");
        }
    }

    /// Delivers `event` to every subscriber, pruning the ones whose write fails.
    ///
    /// Never fails: a slow or dead subscriber only costs its own write deadline.
    pub async fn broadcast(&self, event: &LibraryEvent) {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("failed to serialize library event: {}", e);
                return;
            }
        };

        let mut clients = self.clients.lock().await;
        let targets: Vec<ConnectionHandle> = clients.values().cloned().collect();

        let mut dead = Vec::new();
        for conn in &targets {
            if let Err(e) = conn.send(&payload).await {
                tracing::warn!(id = %conn.id(), "dropping sync subscriber: {}", e);
                dead.push(conn.clone());
            }
        }

        for conn in &dead {
            clients.remove(&conn.id());
        }
        drop(clients);

        for conn in dead {
            let _ = conn.close().await;
        }
    }

    pub async fn stats(&self) -> SyncStats {
        let clients = self.clients.lock().await;
        let mut stats = SyncStats::default();
        for conn in clients.values() {
            match conn.transport() {
                Transport::Stream => stats.tcp_clients += 1,
                Transport::WebSocket => stats.ws_clients += 1,
            }
        }
        stats
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    /// Greets a freshly registered TCP client with the current subscriber count.
    pub async fn welcome(&self, conn: &dyn Connection) -> Result<(), ConnectionError> {
        let welcome = SyncWelcome::new(self.client_count().await);
        let payload = serde_json::to_vec(&welcome).map_err(|e| {
            ConnectionError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        conn.send(&payload).await
    }
}
