//! Application state wiring the adapters together.
//!
//! AppState holds the concrete store and thread database used by every
//! command. The completion provider is only built for `chat`, since listing
//! sessions must work without credentials.

use std::sync::Arc;

use anyhow::Context;
use chatkeep_core::chat::controller::SessionController;
use chatkeep_core::chat::gateway::LlmGateway;
use chatkeep_core::chat::title_sync::{NoopTitleSync, ThreadTitleSync};
use chatkeep_core::llm::box_provider::BoxLlmProvider;
use chatkeep_infra::config::load_config;
use chatkeep_infra::filesystem::{resolve_data_dir, sessions_dir};
use chatkeep_infra::llm::AzureOpenAiProvider;
use chatkeep_infra::sql::SqlThreadTitleSync;
use chatkeep_infra::store::FileSessionStore;
use chatkeep_types::config::ChatkeepConfig;
use chatkeep_types::error::SyncError;

/// Thread title sync selected at startup: the SQL table when configured,
/// otherwise a no-op.
pub enum TitleSyncBackend {
    Sql(SqlThreadTitleSync),
    Noop(NoopTitleSync),
}

impl ThreadTitleSync for TitleSyncBackend {
    async fn update_title(&self, session_id: &str, title: &str) -> Result<(), SyncError> {
        match self {
            TitleSyncBackend::Sql(sync) => sync.update_title(session_id, title).await,
            TitleSyncBackend::Noop(sync) => sync.update_title(session_id, title).await,
        }
    }
}

/// Controller pinned to the concrete infra implementations.
pub type ConcreteController = SessionController<LlmGateway, FileSessionStore, TitleSyncBackend>;

/// Shared application state.
pub struct AppState {
    pub config: ChatkeepConfig,
    pub store: Arc<FileSessionStore>,
    pub title_sync: Arc<TitleSyncBackend>,
}

impl AppState {
    /// Resolve the data directory, load configuration, wire adapters.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        tracing::debug!(?config, data_dir = %data_dir.display(), "Configuration loaded");

        let store = FileSessionStore::new(sessions_dir(&config, &data_dir), config.storage.log_format);

        let title_sync = match SqlThreadTitleSync::from_config(&config.thread_db) {
            Some(sync) => TitleSyncBackend::Sql(sync),
            None => {
                tracing::info!("Thread database not configured; titles are stored locally only");
                TitleSyncBackend::Noop(NoopTitleSync)
            }
        };

        Ok(Self {
            config,
            store: Arc::new(store),
            title_sync: Arc::new(title_sync),
        })
    }

    /// The SQL thread table, when configured.
    pub fn thread_db(&self) -> Option<&SqlThreadTitleSync> {
        match self.title_sync.as_ref() {
            TitleSyncBackend::Sql(sync) => Some(sync),
            TitleSyncBackend::Noop(_) => None,
        }
    }

    /// Build a session controller backed by the configured completion service.
    pub fn controller(&self) -> anyhow::Result<ConcreteController> {
        let provider = AzureOpenAiProvider::from_config(&self.config.completion)
            .context("Completion service is not configured")?;
        let gateway = LlmGateway::from_config(BoxLlmProvider::new(provider), &self.config.completion);

        Ok(SessionController::new(
            Arc::new(gateway),
            self.store.clone(),
            self.title_sync.clone(),
        ))
    }
}
