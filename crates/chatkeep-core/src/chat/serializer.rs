//! Conversion between message histories and the durable `full_log` forms.
//!
//! Two representations are supported:
//! - text: one `[YYYY-MM-DD HH:MM:SS] Role: content` line per message
//! - structured: a list of `{role, content, author, timestamp}` records
//!
//! Parsing never fails. Lines or entries that cannot be understood are
//! dropped with a warning and the rest of the log is kept.

use std::sync::LazyLock;

use chatkeep_types::chat::{
    format_timestamp, parse_timestamp, ChatMessage, FullLog, LogEntry, LogFormat, MessageRole,
};
use regex::Regex;

/// `[<ts>] <Role>: <content>`
static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[(?P<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\] (?P<role>[A-Za-z_]+):\s?(?P<content>.*)$",
    )
    .expect("log line regex is valid")
});

/// Render a history as newline-separated log lines.
pub fn format_text(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| {
            format!(
                "[{}] {}: {}",
                format_timestamp(&m.timestamp),
                m.role.label(),
                m.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a history as structured log entries.
pub fn format_structured(history: &[ChatMessage]) -> Vec<LogEntry> {
    history
        .iter()
        .map(|m| LogEntry {
            role: m.role.to_string(),
            content: m.content.clone(),
            author: Some(m.role.label().to_string()),
            timestamp: Some(format_timestamp(&m.timestamp)),
        })
        .collect()
}

/// Render a history in the requested representation.
pub fn format(history: &[ChatMessage], format: LogFormat) -> FullLog {
    match format {
        LogFormat::Text => FullLog::Text(format_text(history)),
        LogFormat::Structured => FullLog::Structured(
            format_structured(history)
                .into_iter()
                .filter_map(|entry| serde_json::to_value(entry).ok())
                .collect(),
        ),
    }
}

/// Reconstruct a history from either representation.
pub fn parse(log: &FullLog) -> Vec<ChatMessage> {
    match log {
        FullLog::Text(text) => parse_text(text),
        FullLog::Structured(entries) => parse_structured(entries),
    }
}

/// Parse text log lines back into messages.
pub fn parse_text(text: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(message) => messages.push(message),
            None => {
                tracing::warn!(line = idx + 1, "Dropping malformed log line");
            }
        }
    }

    messages
}

fn parse_line(line: &str) -> Option<ChatMessage> {
    let caps = LINE_RE.captures(line.trim_end_matches('\r'))?;
    let timestamp = parse_timestamp(&caps["ts"])?;
    let role = logged_role(&caps["role"])?;
    let content = caps["content"].trim();
    Some(ChatMessage::new(role, content, timestamp))
}

/// Parse structured log entries back into messages.
pub fn parse_structured(entries: &[serde_json::Value]) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    for (idx, value) in entries.iter().enumerate() {
        let entry: LogEntry = match serde_json::from_value(value.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(entry = idx, error = %e, "Dropping malformed log entry");
                continue;
            }
        };

        let Some(role) = logged_role(&entry.role) else {
            tracing::warn!(entry = idx, role = %entry.role, "Dropping log entry with unknown role");
            continue;
        };

        let timestamp = match entry.timestamp.as_deref() {
            Some(raw) => match parse_timestamp(raw) {
                Some(ts) => ts,
                None => {
                    tracing::warn!(entry = idx, timestamp = raw, "Dropping log entry with bad timestamp");
                    continue;
                }
            },
            None => {
                tracing::warn!(entry = idx, "Dropping log entry without timestamp");
                continue;
            }
        };

        messages.push(ChatMessage::new(role, entry.content, timestamp));
    }

    messages
}

/// Map a role token to a logged role. System and unknown roles yield `None`.
fn logged_role(raw: &str) -> Option<MessageRole> {
    match raw.trim().to_lowercase().as_str() {
        "user" | "user_message" => Some(MessageRole::User),
        "assistant" | "assistant_message" => Some(MessageRole::Assistant),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;

    fn ts(m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(12, m, s)
            .unwrap()
    }

    fn sample() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("What is 2+2?", ts(0, 0)),
            ChatMessage::assistant("4", ts(0, 1)),
        ]
    }

    #[test]
    fn test_format_text_lines() {
        let text = format_text(&sample());
        assert_eq!(
            text,
            "[2025-01-02 12:00:00] User: What is 2+2?\n[2025-01-02 12:00:01] Assistant: 4"
        );
    }

    #[test]
    fn test_format_text_empty_history() {
        assert_eq!(format_text(&[]), "");
        assert!(parse_text("").is_empty());
    }

    #[test]
    fn test_text_round_trip() {
        let history = vec![
            ChatMessage::user("Hi: there [friend]", ts(0, 0)),
            ChatMessage::assistant("Hello!", ts(0, 0)),
            ChatMessage::user("Hi: there [friend]", ts(0, 5)),
            ChatMessage::assistant("", ts(1, 0)),
        ];
        assert_eq!(parse_text(&format_text(&history)), history);
    }

    #[test]
    fn test_structured_round_trip_keeps_multiline_content() {
        let history = vec![
            ChatMessage::user("line one\nline two", ts(0, 0)),
            ChatMessage::assistant("  padded  ", ts(0, 1)),
        ];
        let log = format(&history, LogFormat::Structured);
        assert_eq!(parse(&log), history);
    }

    #[test]
    fn test_format_structured_sets_author() {
        let entries = format_structured(&sample());
        assert_eq!(entries[0].role, "user");
        assert_eq!(entries[0].author.as_deref(), Some("User"));
        assert_eq!(entries[1].timestamp.as_deref(), Some("2025-01-02 12:00:01"));
    }

    #[test]
    fn test_parse_text_drops_malformed_lines() {
        let text = "\
[2025-01-02 12:00:00] User: first
garbage line without brackets

[2025-01-02 12:00:0] User: truncated timestamp
[2025-13-40 12:00:00] User: impossible date
[2025-01-02 12:00:01] System: be helpful
[2025-01-02 12:00:02] Robot: beep
[2025-01-02 12:00:03] Assistant: second
[2025-01-02 12:00:04] Assistant";

        let messages = parse_text(text);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }

    #[test]
    fn test_parse_text_role_is_case_insensitive_and_content_trimmed() {
        let messages = parse_text("[2025-01-02 12:00:00] USER:    spaced out   \r\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "spaced out");
    }

    #[test]
    fn test_parse_text_content_may_contain_role_marker() {
        let messages = parse_text("[2025-01-02 12:00:00] User: Assistant: pretend");
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "Assistant: pretend");
    }

    #[test]
    fn test_parse_structured_accepts_step_shapes() {
        let entries = vec![
            json!({"type": "user_message", "content": "hi", "timestamp": "2025-01-02T12:00:00.250Z"}),
            json!({"role": "Assistant", "content": "hello", "author": "Assistant", "timestamp": "2025-01-02 12:00:01"}),
        ];
        let messages = parse_structured(&entries);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].timestamp, ts(0, 0));
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn test_parse_structured_drops_malformed_entries() {
        let entries = vec![
            json!("not an object"),
            json!({"role": "user"}),
            json!({"role": "tool", "content": "x", "timestamp": "2025-01-02 12:00:00"}),
            json!({"role": "user", "content": "no time"}),
            json!({"role": "user", "content": "bad time", "timestamp": "noon"}),
            json!({"role": "user", "content": "kept", "timestamp": "2025-01-02 12:00:00"}),
        ];
        let messages = parse_structured(&entries);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "kept");
    }

    #[test]
    fn test_format_dispatches_on_log_format() {
        assert!(matches!(format(&sample(), LogFormat::Text), FullLog::Text(_)));
        match format(&sample(), LogFormat::Structured) {
            FullLog::Structured(entries) => assert_eq!(entries.len(), 2),
            other => panic!("expected structured log, got {other:?}"),
        }
    }
}
