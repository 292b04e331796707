//! Transport-agnostic handle for a live subscriber.
//!
//! Hubs only ever see `Arc<dyn Connection>`: they push already-serialized JSON
//! payloads and close on failure. Framing is the adapter's business, so a
//! stream socket terminates each payload with a newline while a WebSocket sends
//! one text frame per payload.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

/// Default per-write deadline for live subscribers.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Raw TCP, newline-delimited JSON.
    Stream,
    WebSocket,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),
    #[error("payload is not valid utf-8")]
    InvalidText,
}

#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Used for stats reporting only.
    fn transport(&self) -> Transport;

    async fn send(&self, payload: &[u8]) -> Result<(), ConnectionError>;

    /// Closing twice is a no-op.
    async fn close(&self) -> Result<(), ConnectionError>;
}

pub type ConnectionHandle = Arc<dyn Connection>;

/// Write side of an accepted TCP sync client.
pub struct StreamConnection {
    id: ConnectionId,
    peer: SocketAddr,
    writer: Mutex<Option<OwnedWriteHalf>>,
    write_timeout: Duration,
    closed: Notify,
}

impl StreamConnection {
    pub fn new(writer: OwnedWriteHalf, peer: SocketAddr, write_timeout: Duration) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            writer: Mutex::new(Some(writer)),
            write_timeout,
            closed: Notify::new(),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Resolves once `close` has been called, so the owning reader can stop.
    pub async fn closed(&self) {
        self.closed.notified().await
    }
}

#[async_trait]
impl Connection for StreamConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn transport(&self) -> Transport {
        Transport::Stream
    }

    async fn send(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ConnectionError::Closed)?;

        let mut line = Vec::with_capacity(payload.len() + 1);
        line.extend_from_slice(payload);
        line.push(b'\n');

        tokio::time::timeout(self.write_timeout, async {
            writer.write_all(&line).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| ConnectionError::Timeout(self.write_timeout))??;

        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        self.closed.notify_one();
        writer.shutdown().await?;
        Ok(())
    }
}

/// Write side of an upgraded WebSocket.
pub struct WsConnection {
    id: ConnectionId,
    sink: Mutex<Option<SplitSink<WebSocket, Message>>>,
    write_timeout: Duration,
    closed: Notify,
}

impl WsConnection {
    pub fn new(sink: SplitSink<WebSocket, Message>, write_timeout: Duration) -> Self {
        Self {
            id: ConnectionId::new(),
            sink: Mutex::new(Some(sink)),
            write_timeout,
            closed: Notify::new(),
        }
    }

    pub async fn closed(&self) {
        self.closed.notified().await
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn transport(&self) -> Transport {
        Transport::WebSocket
    }

    async fn send(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        let text = std::str::from_utf8(payload).map_err(|_| ConnectionError::InvalidText)?;

        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(ConnectionError::Closed)?;

        tokio::time::timeout(self.write_timeout, sink.send(Message::Text(text.to_owned().into())))
            .await
            .map_err(|_| ConnectionError::Timeout(self.write_timeout))??;

        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        self.closed.notify_one();

        // A peer that stopped reading must not stall the closer.
        match tokio::time::timeout(self.write_timeout, async {
            let _ = sink.send(Message::Close(None)).await;
            sink.close().await
        })
        .await
        {
            Ok(result) => result.map_err(ConnectionError::from),
            Err(_) => Err(ConnectionError::Timeout(self.write_timeout)),
        }
    }
}
