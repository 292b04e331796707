//! Library change fan-out to TCP and WebSocket subscribers.

mod hub;
mod tcp;
mod ws;

pub use hub::SyncHub;
pub use tcp::SyncTcpServer;
pub use ws::sync_ws_handler;
