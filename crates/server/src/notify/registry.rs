//! UDP push address book.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyClient {
    pub user_id: String,
    pub addr: SocketAddr,
}

/// At most one address per user; the latest registration wins.
#[derive(Default)]
pub struct NotifyRegistry {
    clients: RwLock<HashMap<String, SocketAddr>>,
}

impl NotifyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the address for `user_id`. Blank ids are ignored.
    pub async fn register(&self, user_id: &str, addr: SocketAddr) {
        if user_id.is_empty() {
            return;
        }
        self.clients.write().await.insert(user_id.to_string(), addr);
    }

    pub async fn remove(&self, user_id: &str) -> bool {
        self.clients.write().await.remove(user_id).is_some()
    }

    /// Removes `user_id` only if it is still registered at `addr`, so a
    /// re-registration that raced a failed send survives.
    pub async fn remove_if_at(&self, user_id: &str, addr: SocketAddr) -> bool {
        let mut clients = self.clients.write().await;
        if clients.get(user_id) == Some(&addr) {
            clients.remove(user_id);
            true
        } else {
            false
        }
    }

    pub async fn get(&self, user_id: &str) -> Option<SocketAddr> {
        self.clients.read().await.get(user_id).copied()
    }

    /// Point-in-time copy so callers can do network I/O without the lock.
    pub async fn snapshot(&self) -> Vec<NotifyClient> {
        self.clients
            .read()
            .await
            .iter()
            .map(|(user_id, addr)| NotifyClient {
                user_id: user_id.clone(),
                addr: *addr,
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
