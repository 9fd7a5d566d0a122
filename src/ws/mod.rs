pub mod colors;
pub mod registry;
pub mod room;
pub mod store;

use std::sync::Arc;

use crate::config::Config;
use registry::ConnectionRegistry;
use store::RoomStore;

/// Shared relay state handed to every handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: ConnectionRegistry,
    pub rooms: RoomStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            registry: ConnectionRegistry::new(),
            rooms: RoomStore::new(),
        }
    }
}
