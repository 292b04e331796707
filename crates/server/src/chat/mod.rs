//! Room chat over WebSocket.

mod hub;
mod ws;

pub use hub::{ChatHub, DEFAULT_HISTORY_SIZE};
pub use ws::{chat_history, chat_ws_handler};
