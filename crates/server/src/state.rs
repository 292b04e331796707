//! Application state shared across request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::chat::ChatHub;
use crate::jwt::TokenService;
use crate::notify::{NotifyRegistry, NotifyService};
use crate::store::{LibraryStore, UserStore};
use crate::sync::SyncHub;

/// One instance per process, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub library: Arc<dyn LibraryStore>,
    pub tokens: TokenService,
    pub sync_hub: Arc<SyncHub>,
    pub chat_hub: Arc<ChatHub>,
    pub notifier: NotifyService,
    pub write_timeout: Duration,
}

impl AppState {
    pub fn notify_registry(&self) -> &Arc<NotifyRegistry> {
        self.notifier.registry()
    }
}
