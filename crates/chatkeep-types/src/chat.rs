//! Chat message, session record, and durable log types for chatkeep.
//!
//! These types model one conversation between a user and the assistant:
//! the timestamped turns, the record persisted per session id, and the two
//! durable representations of the full log (line text and structured list).

use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// Canonical timestamp format used in rendered logs and durable records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time truncated to whole seconds.
pub fn now_timestamp() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Render a timestamp in the canonical `YYYY-MM-DD HH:MM:SS` form.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp in the canonical form, falling back to RFC 3339.
///
/// RFC 3339 values keep their wall-clock time and drop the offset; sub-second
/// precision is truncated either way.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .map(|ts| ts.trunc_subsecs(0))
}

/// Serde adapter for canonical timestamps.
pub mod canonical_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: '{raw}'")))
    }
}

/// One conversational turn.
///
/// Never mutated after creation; the message log only appends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(with = "canonical_timestamp")]
    pub timestamp: NaiveDateTime,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self::new(MessageRole::User, content, timestamp)
    }

    pub fn assistant(content: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self::new(MessageRole::Assistant, content, timestamp)
    }

    /// Strip the timestamp for a completion request.
    pub fn to_llm_message(&self) -> crate::llm::Message {
        crate::llm::Message::new(self.role, self.content.clone())
    }
}

/// Lifecycle state of a session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session bound yet.
    Idle,
    /// History is being accumulated.
    Active,
    /// Record finalized; no further mutation accepted.
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Active => write!(f, "active"),
            SessionState::Ended => write!(f, "ended"),
        }
    }
}

/// Durable snapshot of a finished or in-progress conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub history: Vec<ChatMessage>,
    /// Present only after the session has ended.
    pub title: Option<String>,
    /// Present only after the session has ended.
    pub summary: Option<String>,
    pub created_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
}

/// Lightweight listing entry for stored sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub message_count: usize,
    pub timestamp: String,
}

/// Which `full_log` representation new records are written with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `[YYYY-MM-DD HH:MM:SS] Role: content` lines. Lossy for content
    /// with line breaks or surrounding whitespace.
    Text,
    /// List of `{role, content, author, timestamp}` records.
    #[default]
    Structured,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Structured => write!(f, "structured"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "structured" => Ok(LogFormat::Structured),
            other => Err(format!("invalid log format: '{other}'")),
        }
    }
}

/// The `full_log` field of a durable record, in either representation.
///
/// Structured entries are kept as raw JSON values so that one malformed
/// entry can be dropped without rejecting the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FullLog {
    Text(String),
    Structured(Vec<serde_json::Value>),
}

impl Default for FullLog {
    fn default() -> Self {
        FullLog::Text(String::new())
    }
}

/// One record of the structured log representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(alias = "type")]
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_format_timestamp_canonical() {
        assert_eq!(format_timestamp(&ts(9, 5, 7)), "2025-03-14 09:05:07");
    }

    #[test]
    fn test_parse_timestamp_canonical_and_rfc3339() {
        assert_eq!(parse_timestamp("2025-03-14 09:05:07"), Some(ts(9, 5, 7)));
        assert_eq!(
            parse_timestamp("2025-03-14T09:05:07.532+02:00"),
            Some(ts(9, 5, 7))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2025-03-14 09:05"), None);
    }

    #[test]
    fn test_now_timestamp_has_no_subseconds() {
        use chrono::Timelike;
        assert_eq!(now_timestamp().nanosecond(), 0);
    }

    #[test]
    fn test_chat_message_serde_uses_canonical_timestamp() {
        let msg = ChatMessage::user("Hello", ts(10, 0, 0));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"timestamp\":\"2025-03-14 10:00:00\""));
        assert!(json.contains("\"role\":\"user\""));
        let parsed: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_full_log_untagged_forms() {
        let text: FullLog = serde_json::from_str("\"[2025-03-14 10:00:00] User: hi\"").unwrap();
        assert!(matches!(text, FullLog::Text(_)));

        let structured: FullLog =
            serde_json::from_str(r#"[{"type":"user","content":"hi"}]"#).unwrap();
        match structured {
            FullLog::Structured(entries) => assert_eq!(entries.len(), 1),
            other => panic!("expected structured log, got {other:?}"),
        }
    }

    #[test]
    fn test_log_entry_accepts_type_alias() {
        let entry: LogEntry =
            serde_json::from_str(r#"{"type":"assistant","content":"4"}"#).unwrap();
        assert_eq!(entry.role, "assistant");
        assert!(entry.author.is_none());
    }

    #[test]
    fn test_log_format_roundtrip() {
        for format in [LogFormat::Text, LogFormat::Structured] {
            let parsed: LogFormat = format.to_string().parse().unwrap();
            assert_eq!(parsed, format);
        }
        assert_eq!(LogFormat::default(), LogFormat::Structured);
    }
}
