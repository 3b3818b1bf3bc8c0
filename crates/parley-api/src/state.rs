//! Application state wiring all services together.
//!
//! The session manager is generic over its store and engine ports;
//! AppState pins it to the concrete infra implementations and owns the
//! loaded configuration.

use std::sync::Arc;

use parley_core::session::SessionManager;
use parley_infra::config::{database_url, engine_api_key, load_config, resolve_data_dir};
use parley_infra::gemini::GeminiEngine;
use parley_infra::sqlite::{DatabasePool, SqliteSessionStore};
use parley_types::config::GatewayConfig;

/// Concrete type alias for the manager pinned to infra implementations.
pub type ConcreteSessionManager = SessionManager<SqliteSessionStore, GeminiEngine>;

/// Shared application state holding the session manager and configuration.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<ConcreteSessionManager>,
    pub config: GatewayConfig,
}

impl AppState {
    /// Initialize the application state: resolve the data directory, load
    /// configuration, connect the store (unless persistence is disabled),
    /// and construct the engine.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;

        let store = match database_url(&config, &data_dir) {
            Some(url) => {
                let pool = DatabasePool::new(&url).await?;
                Some(Arc::new(SqliteSessionStore::new(pool)))
            }
            None => {
                tracing::warn!(
                    "Persistence disabled in config; sessions will not survive a restart"
                );
                None
            }
        };

        let api_key = engine_api_key().ok_or_else(|| {
            anyhow::anyhow!("GEMINI_API_KEY must be set (see https://aistudio.google.com/app/apikey)")
        })?;
        let engine = GeminiEngine::new(api_key)?.with_base_url(config.engine.base_url.clone());

        let sessions = SessionManager::new(store, Arc::new(engine));

        Ok(Self {
            sessions: Arc::new(sessions),
            config,
        })
    }
}
