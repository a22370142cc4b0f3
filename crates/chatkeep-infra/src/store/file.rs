//! Per-session JSON record files.
//!
//! Each session is stored as `{dir}/{session_id}.json`:
//!
//! ```json
//! { "title": "...", "summary": "...", "full_log": "..." | [...], "timestamp": "...",
//!   "session_id": "...", "created_at": "...", "ended_at": "..." }
//! ```
//!
//! Writes go to a temporary file in the same directory which is fsynced and
//! then renamed over the target, so readers only ever see a complete record.

use std::io::Write;
use std::path::{Path, PathBuf};

use chatkeep_core::chat::serializer;
use chatkeep_core::chat::store::SessionStore;
use chatkeep_types::chat::{
    format_timestamp, now_timestamp, parse_timestamp, FullLog, LogFormat, SessionRecord,
    SessionSummary,
};
use chatkeep_types::error::StoreError;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// On-disk shape of a session record.
///
/// Only the first four fields are required to read a record back.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    full_log: FullLog,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ended_at: Option<String>,
}

/// Session store backed by one JSON file per session id.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    format: LogFormat,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`, writing `full_log` as `format`.
    ///
    /// The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>, format: LogFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `session_id`.
    pub fn record_path(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        validate_key(session_id)?;
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    /// The text form cannot carry line breaks or surrounding whitespace, so
    /// such histories are written structured whatever the configured format.
    fn format_for(&self, record: &SessionRecord) -> LogFormat {
        let text_safe = record
            .history
            .iter()
            .all(|m| !m.content.contains(['\n', '\r']) && m.content.trim() == m.content);
        match self.format {
            LogFormat::Text if !text_safe => LogFormat::Structured,
            format => format,
        }
    }

    fn to_stored(&self, record: &SessionRecord) -> StoredSession {
        let timestamp = record.ended_at.unwrap_or_else(now_timestamp);
        StoredSession {
            title: record.title.clone(),
            summary: record.summary.clone(),
            full_log: serializer::format(&record.history, self.format_for(record)),
            timestamp: Some(format_timestamp(&timestamp)),
            session_id: Some(record.session_id.clone()),
            created_at: Some(format_timestamp(&record.created_at)),
            ended_at: record.ended_at.as_ref().map(format_timestamp),
        }
    }
}

fn from_stored(session_id: &str, stored: StoredSession) -> SessionRecord {
    let history = serializer::parse(&stored.full_log);

    let ended_at = stored.ended_at.as_deref().and_then(parse_timestamp);
    let created_at = stored
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| history.first().map(|m| m.timestamp))
        .or_else(|| stored.timestamp.as_deref().and_then(parse_timestamp))
        .unwrap_or_else(now_timestamp);

    SessionRecord {
        session_id: session_id.to_string(),
        history,
        title: stored.title,
        summary: stored.summary,
        created_at,
        ended_at,
    }
}

/// Reject ids that could escape the store directory or are not valid file names.
fn validate_key(session_id: &str) -> Result<(), StoreError> {
    let invalid = session_id.is_empty()
        || session_id == "."
        || session_id.contains("..")
        || session_id.contains(['/', '\\'])
        || session_id.chars().any(char::is_control);
    if invalid {
        return Err(StoreError::InvalidKey(session_id.escape_debug().to_string()));
    }
    Ok(())
}

/// Write `bytes` to `path` via a temp file in the same directory.
///
/// The temp file is deleted on every failure path, leaving any previous
/// version of `path` in place.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    // Persist the directory entry as well.
    #[cfg(unix)]
    {
        if let Ok(dir) = std::fs::File::open(dir) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

impl SessionStore for FileSessionStore {
    fn validate_key(&self, session_id: &str) -> Result<(), StoreError> {
        validate_key(session_id)
    }

    async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.record_path(session_id)?;
        let bytes = serde_json::to_vec_pretty(&self.to_stored(record))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            tracing::error!(dir = %self.dir.display(), error = %e, "Failed to create sessions directory");
            StoreError::from(e)
        })?;

        let dir = self.dir.clone();
        let target = path.clone();
        let written = tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &bytes))
            .await
            .map_err(|e| StoreError::Io(format!("write task failed: {e}")))?;

        if let Err(e) = written {
            tracing::error!(session_id, path = %path.display(), error = %e, "Failed to save session record");
            return Err(e.into());
        }

        tracing::debug!(session_id, path = %path.display(), "Session record saved");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.record_path(session_id)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredSession =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                session_id: session_id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(from_stored(session_id, stored)))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let stored = match tokio::fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str::<StoredSession>(&content)
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            let stored = match stored {
                Ok(stored) => stored,
                Err(reason) => {
                    tracing::warn!(path = %path.display(), %reason, "Skipping unreadable session record");
                    continue;
                }
            };

            let timestamp = stored.timestamp.clone().unwrap_or_default();
            let record = from_stored(session_id, stored);
            summaries.push(SessionSummary {
                session_id: record.session_id,
                title: record.title,
                summary: record.summary,
                message_count: record.history.len(),
                timestamp,
            });
        }

        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(summaries)
    }
}
