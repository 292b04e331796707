//! Newline-delimited JSON sync listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

use super::SyncHub;
use crate::connection::{Connection, ConnectionHandle, StreamConnection};

pub struct SyncTcpServer {
    listener: TcpListener,
    hub: Arc<SyncHub>,
    write_timeout: Duration,
}

impl SyncTcpServer {
    /// Binding failure is surfaced to the caller; the process cannot serve sync without it.
    pub async fn bind(
        addr: SocketAddr,
        hub: Arc<SyncHub>,
        write_timeout: Duration,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("[tcp-sync] listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            hub,
            write_timeout,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts clients until the task is dropped.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => self.accept(stream, peer).await,
                Err(e) => {
                    tracing::warn!("[tcp-sync] accept error: {}", e);
                }
            }
        }
    }

    async fn accept(&self, stream: TcpStream, peer: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let conn = Arc::new(StreamConnection::new(writer, peer, self.write_timeout));
        let handle: ConnectionHandle = conn.clone();

        self.hub.register(handle).await;
        if let Err(e) = self.hub.welcome(&*conn).await {
            tracing::warn!("[tcp-sync] failed to greet {}: {}", peer, e);
            self.hub.unregister(conn.id()).await;
            return;
        }
        tracing::info!("[tcp-sync] client connected: {}", peer);

        let hub = self.hub.clone();
        tokio::spawn(async move {
            drain(reader, &conn).await;
            hub.unregister(conn.id()).await;
            tracing::info!("[tcp-sync] client disconnected: {}", conn.peer_addr());
        });
    }
}

/// Consumes and ignores inbound lines until EOF, a read error, or a hub-side close.
async fn drain(reader: OwnedReadHalf, conn: &StreamConnection) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("[tcp-sync] read error from {}: {}", conn.peer_addr(), e);
                    break;
                }
            },
            _ = conn.closed() => break,
        }
    }
}
