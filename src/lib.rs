pub mod auth;
pub mod config;
pub mod layout;
pub mod rest;
pub mod storage;

use std::sync::Arc;

use config::ServerConfig;
use storage::Storage;

/// Shared application state passed to every request handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub storage: Arc<Storage>,
    pub started_at: std::time::Instant,
    /// Stable instance identity, generated per data directory on first start.
    pub instance_id: String,
}

impl AppContext {
    pub fn new(config: Arc<ServerConfig>, storage: Arc<Storage>, instance_id: String) -> Self {
        Self {
            config,
            storage,
            started_at: std::time::Instant::now(),
            instance_id,
        }
    }
}
