//! Process shutdown: signal handling and teardown of the socket listeners.

use std::future::Future;

use tokio::task::JoinHandle;

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
pub async fn signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown requested");
}

/// Long-running listener tasks that must not outlive the HTTP server.
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push((name, tokio::spawn(task)));
    }

    /// Aborts every task and waits until each one has been dropped, so the
    /// sockets they own are closed on return.
    pub async fn shutdown(self) {
        for (_, handle) in &self.handles {
            handle.abort();
        }
        for (name, handle) in self.handles {
            match handle.await {
                Err(e) if e.is_panic() => tracing::error!("{} task panicked: {}", name, e),
                _ => tracing::debug!("{} task stopped", name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::TcpStream;

    use super::*;
    use crate::sync::{SyncHub, SyncTcpServer};

    #[tokio::test]
    async fn shutdown_closes_the_sync_listener() {
        let hub = Arc::new(SyncHub::new());
        let server =
            SyncTcpServer::bind("127.0.0.1:0".parse().unwrap(), hub, Duration::from_millis(200))
                .await
                .unwrap();
        let addr = server.local_addr().unwrap();

        let mut tasks = BackgroundTasks::new();
        tasks.spawn("tcp-sync", server.run());

        TcpStream::connect(addr).await.unwrap();

        tasks.shutdown().await;
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn shutdown_returns_for_tasks_that_never_finish() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("idle", std::future::pending());
        tasks.spawn("done", async {});

        tokio::time::timeout(Duration::from_secs(1), tasks.shutdown())
            .await
            .unwrap();
    }
}
