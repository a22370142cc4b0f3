//! Session store trait definition.

use chatkeep_types::chat::{SessionRecord, SessionSummary};
use chatkeep_types::error::StoreError;

/// Durable per-session record storage.
///
/// Implementations live in chatkeep-infra (e.g., `FileSessionStore`).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait SessionStore: Send + Sync {
    /// Check that `session_id` can be used as a storage key.
    ///
    /// Called when a session is bound, so an unusable id fails before any
    /// conversation happens rather than at the final save.
    fn validate_key(&self, _session_id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    /// Persist the full record under `session_id`, replacing any prior version.
    ///
    /// A failed save must leave the previous version intact.
    fn save(
        &self,
        session_id: &str,
        record: &SessionRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Load the record for `session_id`. `Ok(None)` when nothing was stored.
    fn load(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<SessionRecord>, StoreError>> + Send;

    /// Summaries of every stored record, newest first.
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<SessionSummary>, StoreError>> + Send;
}
