//! Thread title sync trait definition.

use chatkeep_types::error::SyncError;

/// Writes a session's generated title to the external thread table.
///
/// Best-effort from the controller's point of view: failures are logged and
/// never block finalization.
pub trait ThreadTitleSync: Send + Sync {
    fn update_title(
        &self,
        session_id: &str,
        title: &str,
    ) -> impl std::future::Future<Output = Result<(), SyncError>> + Send;
}

/// Used when no relational store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTitleSync;

impl ThreadTitleSync for NoopTitleSync {
    async fn update_title(&self, session_id: &str, _title: &str) -> Result<(), SyncError> {
        tracing::debug!(session_id, "Thread database not configured, skipping title sync");
        Ok(())
    }
}
