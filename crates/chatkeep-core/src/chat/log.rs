//! In-memory message log for one active session.
//!
//! Append-only and ordered by insertion, which is also chronological order.

use chatkeep_types::chat::{format_timestamp, ChatMessage, MessageRole};
use chatkeep_types::error::LogError;
use chrono::NaiveDateTime;

/// Ordered turn sequence for one session.
///
/// Only user and assistant turns are logged; the system instruction is
/// prefixed at request time and never persisted. Timestamps never decrease.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a restored history in its stored order.
    ///
    /// Stored timestamps are wall-clock readings and may step backwards
    /// (DST, clock changes), so ordering is not re-checked here. Only
    /// system entries are dropped. Later appends are checked against the
    /// last restored message.
    pub fn from_history(history: Vec<ChatMessage>) -> Self {
        let messages = history
            .into_iter()
            .filter(|message| {
                let logged = message.role != MessageRole::System;
                if !logged {
                    tracing::warn!("Dropping system entry from restored history");
                }
                logged
            })
            .collect();
        Self { messages }
    }

    /// Add a message to the end of the log.
    pub fn append(&mut self, message: ChatMessage) -> Result<(), LogError> {
        if message.role == MessageRole::System {
            return Err(LogError::UnloggedRole(message.role));
        }
        if let Some(last) = self.messages.last() {
            if message.timestamp < last.timestamp {
                return Err(LogError::OutOfOrder {
                    last: format_timestamp(&last.timestamp),
                    next: format_timestamp(&message.timestamp),
                });
            }
        }
        self.messages.push(message);
        Ok(())
    }

    /// Clamp a clock reading so it is not earlier than the last message.
    pub fn next_timestamp(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self.messages.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }

    /// Immutable copy of the current sequence.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
