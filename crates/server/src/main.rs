//! MangaHub Server
//!
//! Binds the HTTP API, the TCP sync listener and the UDP notify socket, then
//! serves until Ctrl-C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mangahub_server::chat::ChatHub;
use mangahub_server::config::{ServerConfig, StorageMode};
use mangahub_server::jwt::TokenService;
use mangahub_server::notify::{NotifyRegistry, NotifyServer};
use mangahub_server::shutdown::{self, BackgroundTasks};
use mangahub_server::store::{AuroraStore, LibraryStore, MemoryStore, UserStore};
use mangahub_server::sync::{SyncHub, SyncTcpServer};
use mangahub_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mangahub_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;

    let (users, library): (Arc<dyn UserStore>, Arc<dyn LibraryStore>) = match &config.storage {
        StorageMode::Aurora { path } => {
            let store = Arc::new(AuroraStore::open(path).context("failed to open database")?);
            (store.clone() as Arc<dyn UserStore>, store as Arc<dyn LibraryStore>)
        }
        StorageMode::Memory => {
            tracing::warn!("using in-memory storage; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone() as Arc<dyn UserStore>, store as Arc<dyn LibraryStore>)
        }
    };

    let sync_hub = Arc::new(SyncHub::new());
    let chat_hub = Arc::new(ChatHub::new(config.chat_history));

    let tcp = SyncTcpServer::bind(config.tcp_addr, sync_hub.clone(), config.write_timeout)
        .await
        .with_context(|| format!("failed to bind TCP sync listener on {}", config.tcp_addr))?;
    let udp = NotifyServer::bind(config.udp_addr, Arc::new(NotifyRegistry::new()))
        .await
        .with_context(|| format!("failed to bind UDP notify socket on {}", config.udp_addr))?;

    let state = AppState {
        users,
        library,
        tokens: TokenService::new(
            config.auth.secret.as_bytes(),
            config.auth.issuer.clone(),
            config.auth.ttl,
        ),
        sync_hub,
        chat_hub,
        notifier: udp.notifier(),
        write_timeout: config.write_timeout,
    };

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", config.http_addr))?;
    tracing::info!("Starting server on {}", config.http_addr);

    let mut tasks = BackgroundTasks::new();
    tasks.spawn("tcp-sync", tcp.run());
    tasks.spawn("udp-notify", udp.run());

    let served = axum::serve(listener, mangahub_server::router(state))
        .with_graceful_shutdown(shutdown::signal())
        .await;

    // Listeners go down whether or not HTTP stopped cleanly.
    tasks.shutdown().await;
    served.context("HTTP server failed")?;

    tracing::info!("server stopped");
    Ok(())
}
