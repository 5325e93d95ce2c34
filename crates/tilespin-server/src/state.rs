use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::assets::AssetStore;
use crate::config::ServerConfig;
use crate::session_manager::SessionManager;

pub type SharedSessionManager = Arc<RwLock<SessionManager>>;

#[derive(Clone)]
pub struct AppState {
    pub session: SharedSessionManager,
    pub assets: Arc<AssetStore>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_manager(config, SessionManager::new())
    }

    /// Build state around a pre-made manager (seeded sessions in tests).
    pub fn with_manager(config: ServerConfig, manager: SessionManager) -> Self {
        Self {
            session: Arc::new(RwLock::new(manager)),
            assets: Arc::new(AssetStore::new(&config.assets)),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Holds one slot of the global WebSocket connection count for as long as
/// it lives.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    /// Take a slot unless `max` are already in use.
    pub fn try_acquire(counter: Arc<AtomicUsize>, max: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()?;
        Some(Self { counter })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}
