#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mangahub_server::chat::ChatHub;
use mangahub_server::jwt::TokenService;
use mangahub_server::notify::{NotifyRegistry, NotifyServer};
use mangahub_server::store::MemoryStore;
use mangahub_server::sync::{SyncHub, SyncTcpServer};
use mangahub_server::AppState;
use serde_json::{json, Value};

pub struct TestApp {
    pub http_addr: SocketAddr,
    pub tcp_addr: SocketAddr,
    pub udp_addr: SocketAddr,
    pub state: AppState,
    pub client: reqwest::Client,
}

/// Starts every listener on an ephemeral loopback port with in-memory storage.
pub async fn spawn_app() -> TestApp {
    let loopback: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let store = Arc::new(MemoryStore::new());
    let sync_hub = Arc::new(SyncHub::new());
    let write_timeout = Duration::from_millis(500);

    let tcp = SyncTcpServer::bind(loopback, sync_hub.clone(), write_timeout)
        .await
        .unwrap();
    let udp = NotifyServer::bind(loopback, Arc::new(NotifyRegistry::new()))
        .await
        .unwrap();
    let tcp_addr = tcp.local_addr().unwrap();
    let udp_addr = udp.local_addr().unwrap();

    let state = AppState {
        users: store.clone(),
        library: store,
        tokens: TokenService::new(b"integration-secret", "mangahub", chrono::Duration::hours(1)),
        sync_hub,
        chat_hub: Arc::new(ChatHub::new(5)),
        notifier: udp.notifier(),
        write_timeout,
    };

    let listener = tokio::net::TcpListener::bind(loopback).await.unwrap();
    let http_addr = listener.local_addr().unwrap();
    let app = mangahub_server::router(state.clone());

    tokio::spawn(tcp.run());
    tokio::spawn(udp.run());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        http_addr,
        tcp_addr,
        udp_addr,
        state,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.http_addr, path)
    }

    /// Registers `username` and returns the session token.
    pub async fn register(&self, username: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": password,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({
                "email": format!("{username}@example.com"),
                "password": password,
            }))
            .send()
            .await
            .unwrap()
    }

    pub async fn me(&self, token: &str) -> reqwest::Response {
        self.client
            .get(self.url("/api/users/me"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

/// Polls `check` until it holds or a second passes.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
