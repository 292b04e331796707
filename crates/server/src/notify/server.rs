//! UDP registration listener and best-effort chapter push.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mangahub_shared::{NewChapterNotice, NotifyRequest};
use tokio::net::UdpSocket;

use super::registry::{NotifyClient, NotifyRegistry};

const MAX_DATAGRAM: usize = 2048;

/// Outbound half of the notify transport.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    async fn send_to(&self, payload: &[u8], addr: SocketAddr) -> std::io::Result<()>;
}

#[async_trait]
impl DatagramSink for UdpSocket {
    async fn send_to(&self, payload: &[u8], addr: SocketAddr) -> std::io::Result<()> {
        UdpSocket::send_to(self, payload, addr).await.map(|_| ())
    }
}

/// Sends new-chapter notices to every registered client.
#[derive(Clone)]
pub struct NotifyService {
    registry: Arc<NotifyRegistry>,
    sink: Arc<dyn DatagramSink>,
}

impl NotifyService {
    pub fn new(registry: Arc<NotifyRegistry>, sink: Arc<dyn DatagramSink>) -> Self {
        Self { registry, sink }
    }

    pub fn registry(&self) -> &Arc<NotifyRegistry> {
        &self.registry
    }

    /// Returns how many clients the notice was handed to.
    ///
    /// Each client gets one send and one retry; a client failing both is
    /// deregistered. With no acknowledgement on UDP this cannot tell a blip
    /// from a departed client.
    pub async fn broadcast_new_chapter(&self, manga_id: &str, chapter: u32) -> usize {
        let payload = match serde_json::to_vec(&NewChapterNotice::new(manga_id, chapter)) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("failed to serialize new chapter notice: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for client in self.registry.snapshot().await {
            if self.send_with_retry(&client, &payload).await {
                delivered += 1;
            }
        }
        tracing::info!(
            "[notify] new chapter {} of {} sent to {} client(s)",
            chapter,
            manga_id,
            delivered
        );
        delivered
    }

    async fn send_with_retry(&self, client: &NotifyClient, payload: &[u8]) -> bool {
        if self.sink.send_to(payload, client.addr).await.is_ok() {
            return true;
        }
        match self.sink.send_to(payload, client.addr).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "[notify] failed to notify user {} at {}: {}",
                    client.user_id,
                    client.addr,
                    e
                );
                self.registry.remove_if_at(&client.user_id, client.addr).await;
                false
            }
        }
    }
}

/// Owns the UDP socket: receives registrations and sends notices from the same port.
pub struct NotifyServer {
    socket: Arc<UdpSocket>,
    registry: Arc<NotifyRegistry>,
}

impl NotifyServer {
    pub async fn bind(addr: SocketAddr, registry: Arc<NotifyRegistry>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        tracing::info!("[notify] UDP server listening on {}", socket.local_addr()?);
        Ok(Self {
            socket: Arc::new(socket),
            registry,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn notifier(&self) -> NotifyService {
        NotifyService::new(self.registry.clone(), self.socket.clone())
    }

    /// Receive loop. Bad datagrams are logged and dropped; nothing stops it
    /// short of dropping the task.
    pub async fn run(self) {
        let mut buffer = [0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((n, from)) => handle_datagram(&self.registry, &buffer[..n], from).await,
                Err(e) => {
                    tracing::warn!("[notify] receive error: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}

pub(crate) async fn handle_datagram(registry: &NotifyRegistry, data: &[u8], from: SocketAddr) {
    match NotifyRequest::parse(data) {
        Ok(NotifyRequest::Register { user_id }) => {
            registry.register(&user_id, from).await;
            tracing::info!("[notify] registered UDP client {} ({})", user_id, from);
        }
        Ok(NotifyRequest::Unregister { user_id }) => {
            // Only the registered endpoint may drop its own registration.
            if registry.remove_if_at(&user_id, from).await {
                tracing::info!("[notify] unregistered UDP client {} ({})", user_id, from);
            } else {
                tracing::debug!("[notify] ignoring unregister for {} from {}", user_id, from);
            }
        }
        Ok(NotifyRequest::Unknown { kind }) => {
            tracing::debug!("[notify] ignoring {} message from {}", kind, from);
        }
        Err(e) => {
            tracing::warn!("[notify] invalid UDP message from {}: {}", from, e);
        }
    }
}
