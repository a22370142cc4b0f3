//! Session lifecycle controller.
//!
//! `SessionController` drives one session through `Idle -> Active -> Ended`
//! in response to the four host events: start, resume, message, end. It owns
//! the session context (id, message log, creation time) for the session's
//! lifetime and calls into the gateway, store, and title sync ports.
//!
//! Generic over the ports so that chatkeep-core never depends on
//! chatkeep-infra.

use std::sync::Arc;

use chatkeep_types::chat::{now_timestamp, ChatMessage, SessionRecord, SessionState};
use chatkeep_types::error::SessionError;
use chrono::NaiveDateTime;
use tracing::{info, warn};

use super::gateway::CompletionGateway;
use super::log::MessageLog;
use super::serializer;
use super::store::SessionStore;
use super::title_sync::ThreadTitleSync;

/// Source of "now" for message and record timestamps.
pub type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Result of a resume event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Prior history was found and adopted.
    Restored { messages: usize },
    /// Nothing usable was stored; the session starts with an empty history.
    Fresh,
}

/// Result of an end event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    /// History was empty: nothing generated, written, or synced.
    Empty,
    /// The record was finalized and persisted.
    Finalized(SessionRecord),
}

/// State bound to one session id while it is active.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub log: MessageLog,
    pub created_at: NaiveDateTime,
}

/// Drives a single session's lifecycle.
pub struct SessionController<G: CompletionGateway, S: SessionStore, T: ThreadTitleSync> {
    gateway: Arc<G>,
    store: Arc<S>,
    title_sync: Arc<T>,
    clock: Clock,
    state: SessionState,
    context: Option<SessionContext>,
}

impl<G: CompletionGateway, S: SessionStore, T: ThreadTitleSync> SessionController<G, S, T> {
    pub fn new(gateway: Arc<G>, store: Arc<S>, title_sync: Arc<T>) -> Self {
        Self {
            gateway,
            store,
            title_sync,
            clock: Box::new(now_timestamp),
            state: SessionState::Idle,
            context: None,
        }
    }

    /// Replace the wall clock (tests, replay).
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.session_id.as_str())
    }

    /// Current history; empty while idle.
    pub fn history(&self) -> &[ChatMessage] {
        self.context.as_ref().map(|c| c.log.messages()).unwrap_or(&[])
    }

    // --- Lifecycle events ---

    /// Bind a new session with an empty history.
    ///
    /// Ids the store cannot key a record by are rejected and the controller
    /// stays idle.
    pub fn start(&mut self, session_id: impl Into<String>) -> Result<(), SessionError> {
        self.require(SessionState::Idle, "start")?;

        let session_id = session_id.into();
        self.store.validate_key(&session_id)?;
        info!(session_id = %session_id, "Session started");
        self.bind(session_id, MessageLog::new(), (self.clock)());
        Ok(())
    }

    /// Bind a session, adopting its stored history when one exists.
    ///
    /// A missing record, an empty history, or an unreadable record all
    /// degrade to a fresh session rather than failing.
    pub async fn resume(
        &mut self,
        session_id: impl Into<String>,
    ) -> Result<ResumeOutcome, SessionError> {
        self.require(SessionState::Idle, "resume")?;
        let session_id = session_id.into();
        self.store.validate_key(&session_id)?;

        let stored = match self.store.load(&session_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Stored session unreadable, starting fresh");
                None
            }
        };

        let (log, created_at, outcome) = match stored {
            Some(record) if !record.history.is_empty() => {
                let log = MessageLog::from_history(record.history);
                let outcome = ResumeOutcome::Restored {
                    messages: log.len(),
                };
                (log, record.created_at, outcome)
            }
            _ => (MessageLog::new(), (self.clock)(), ResumeOutcome::Fresh),
        };

        match &outcome {
            ResumeOutcome::Restored { messages } => {
                info!(session_id = %session_id, messages, "Session resumed with previous history");
            }
            ResumeOutcome::Fresh => {
                info!(session_id = %session_id, "No previous history found, starting fresh");
            }
        }

        self.bind(session_id, log, created_at);
        Ok(outcome)
    }

    /// Record a user message and return the assistant's reply.
    ///
    /// On gateway failure the user turn stays in the history and the error
    /// is returned; no assistant turn is fabricated.
    pub async fn message(&mut self, text: impl Into<String>) -> Result<String, SessionError> {
        self.require(SessionState::Active, "message")?;
        let Some(ctx) = self.context.as_mut() else {
            return Err(SessionError::InvalidState {
                operation: "message",
                state: self.state,
            });
        };

        let user_ts = ctx.log.next_timestamp((self.clock)());
        ctx.log.append(ChatMessage::user(text, user_ts))?;

        let reply = self.gateway.reply(ctx.log.messages()).await?;

        let reply_ts = ctx.log.next_timestamp((self.clock)());
        ctx.log.append(ChatMessage::assistant(reply.clone(), reply_ts))?;

        tracing::debug!(session_id = %ctx.session_id, messages = ctx.log.len(), "Turn recorded");
        Ok(reply)
    }

    /// Finalize the session: title, best-effort title sync, summary, save.
    ///
    /// An empty history is a no-op and the session stays active. Any gateway
    /// or store failure also leaves the session active so `end` can be
    /// retried.
    pub async fn end(&mut self) -> Result<EndOutcome, SessionError> {
        if self.state == SessionState::Ended {
            return Err(SessionError::AlreadyEnded);
        }
        self.require(SessionState::Active, "end")?;
        let Some(ctx) = self.context.as_ref() else {
            return Err(SessionError::InvalidState {
                operation: "end",
                state: self.state,
            });
        };

        if ctx.log.is_empty() {
            info!(session_id = %ctx.session_id, "Empty session, nothing to finalize");
            return Ok(EndOutcome::Empty);
        }

        let history = ctx.log.snapshot();
        let log_text = serializer::format_text(&history);

        let title = self.gateway.title(&log_text).await?;

        if let Err(e) = self.title_sync.update_title(&ctx.session_id, &title).await {
            warn!(session_id = %ctx.session_id, error = %e, "Thread title sync failed");
        }

        let summary = self.gateway.summarize(&log_text).await?;

        let record = SessionRecord {
            session_id: ctx.session_id.clone(),
            history,
            title: Some(title),
            summary: Some(summary),
            created_at: ctx.created_at,
            ended_at: Some(ctx.log.next_timestamp((self.clock)())),
        };

        self.store.save(&ctx.session_id, &record).await?;

        info!(
            session_id = %ctx.session_id,
            messages = record.history.len(),
            title = record.title.as_deref().unwrap_or_default(),
            "Session ended"
        );
        self.state = SessionState::Ended;
        Ok(EndOutcome::Finalized(record))
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn bind(&mut self, session_id: String, log: MessageLog, created_at: NaiveDateTime) {
        self.context = Some(SessionContext {
            session_id,
            log,
            created_at,
        });
        self.state = SessionState::Active;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chatkeep_types::chat::{MessageRole, SessionSummary};
    use chatkeep_types::error::{StoreError, SyncError};
    use chatkeep_types::llm::LlmError;
    use chrono::NaiveDate;

    use super::*;

    // --- Mocks ---

    #[derive(Default)]
    struct MockGateway {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        title: Mutex<Option<String>>,
        summary: Mutex<Option<String>>,
        reply_calls: AtomicUsize,
        title_calls: AtomicUsize,
        summary_calls: AtomicUsize,
        seen_history_lens: Mutex<Vec<usize>>,
    }

    impl MockGateway {
        fn scripted(replies: &[&str], title: &str, summary: &str) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
                title: Mutex::new(Some(title.to_string())),
                summary: Mutex::new(Some(summary.to_string())),
                ..Default::default()
            }
        }
    }

    impl CompletionGateway for MockGateway {
        async fn reply(&self, history: &[ChatMessage]) -> Result<String, LlmError> {
            self.reply_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_history_lens.lock().unwrap().push(history.len());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Overloaded("no scripted reply".into())))
        }

        async fn title(&self, _log_text: &str) -> Result<String, LlmError> {
            self.title_calls.fetch_add(1, Ordering::SeqCst);
            self.title
                .lock()
                .unwrap()
                .clone()
                .ok_or(LlmError::EmptyCompletion)
        }

        async fn summarize(&self, _log_text: &str) -> Result<String, LlmError> {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            self.summary
                .lock()
                .unwrap()
                .clone()
                .ok_or(LlmError::EmptyCompletion)
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<HashMap<String, SessionRecord>>,
        fail_save: Mutex<bool>,
        fail_load: bool,
        saves: AtomicUsize,
    }

    impl SessionStore for MemoryStore {
        fn validate_key(&self, session_id: &str) -> Result<(), StoreError> {
            if session_id.contains('/') {
                return Err(StoreError::InvalidKey(session_id.to_string()));
            }
            Ok(())
        }

        async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if *self.fail_save.lock().unwrap() {
                return Err(StoreError::Io("disk full".into()));
            }
            self.records
                .lock()
                .unwrap()
                .insert(session_id.to_string(), record.clone());
            Ok(())
        }

        async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
            if self.fail_load {
                return Err(StoreError::Corrupt {
                    session_id: session_id.to_string(),
                    reason: "truncated".into(),
                });
            }
            Ok(self.records.lock().unwrap().get(session_id).cloned())
        }

        async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct MockSync {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl ThreadTitleSync for MockSync {
        async fn update_title(&self, session_id: &str, title: &str) -> Result<(), SyncError> {
            self.calls
                .lock()
                .unwrap()
                .push((session_id.to_string(), title.to_string()));
            if self.fail {
                Err(SyncError::Connection("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn controller(
        gateway: MockGateway,
        store: Arc<MemoryStore>,
        sync: Arc<MockSync>,
    ) -> SessionController<MockGateway, MemoryStore, MockSync> {
        SessionController::new(Arc::new(gateway), store, sync).with_clock(fixed_clock)
    }

    // --- Scenarios ---

    #[tokio::test]
    async fn test_example_scenario() {
        let store = Arc::new(MemoryStore::default());
        let sync = Arc::new(MockSync::default());
        let gateway = MockGateway::scripted(
            &["Hi there!", "4"],
            "Quick Math Greeting Chat",
            "User greeted the assistant and asked a simple math question.",
        );
        let mut ctl = controller(gateway, store.clone(), sync.clone());

        ctl.start("thread-42").unwrap();
        assert_eq!(ctl.message("Hello").await.unwrap(), "Hi there!");
        assert_eq!(ctl.message("What's 2+2?").await.unwrap(), "4");

        let outcome = ctl.end().await.unwrap();
        assert_eq!(ctl.state(), SessionState::Ended);

        let EndOutcome::Finalized(record) = outcome else {
            panic!("expected finalized record");
        };
        let turns: Vec<(MessageRole, &str)> = record
            .history
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            turns,
            vec![
                (MessageRole::User, "Hello"),
                (MessageRole::Assistant, "Hi there!"),
                (MessageRole::User, "What's 2+2?"),
                (MessageRole::Assistant, "4"),
            ]
        );
        assert_eq!(record.title.as_deref(), Some("Quick Math Greeting Chat"));

        let stored = store.records.lock().unwrap().get("thread-42").cloned().unwrap();
        assert_eq!(stored, record);
        assert_eq!(
            *sync.calls.lock().unwrap(),
            vec![("thread-42".to_string(), "Quick Math Greeting Chat".to_string())]
        );
    }

    #[tokio::test]
    async fn test_reply_sees_full_history() {
        let gateway = MockGateway::scripted(&["a", "b"], "t", "s");
        let mut ctl = controller(gateway, Arc::default(), Arc::default());
        ctl.start("s1").unwrap();
        ctl.message("one").await.unwrap();
        ctl.message("two").await.unwrap();

        assert_eq!(*ctl.gateway.seen_history_lens.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_end_on_empty_history_is_noop() {
        let store = Arc::new(MemoryStore::default());
        let sync = Arc::new(MockSync::default());
        let mut ctl = controller(MockGateway::default(), store.clone(), sync.clone());
        ctl.start("empty").unwrap();

        assert_eq!(ctl.end().await.unwrap(), EndOutcome::Empty);
        assert_eq!(ctl.state(), SessionState::Active);
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert!(sync.calls.lock().unwrap().is_empty());
        assert_eq!(ctl.gateway.title_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_end_does_not_refinalize() {
        let store = Arc::new(MemoryStore::default());
        let sync = Arc::new(MockSync::default());
        let gateway = MockGateway::scripted(&["hi"], "Title", "Summary");
        let mut ctl = controller(gateway, store.clone(), sync.clone());
        ctl.start("once").unwrap();
        ctl.message("hello").await.unwrap();
        ctl.end().await.unwrap();

        let err = ctl.end().await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyEnded));
        assert_eq!(ctl.gateway.title_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.gateway.summary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(sync.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_failure_does_not_block_save() {
        let store = Arc::new(MemoryStore::default());
        let sync = Arc::new(MockSync {
            fail: true,
            ..Default::default()
        });
        let gateway = MockGateway::scripted(&["hi"], "Greeting", "A greeting.");
        let mut ctl = controller(gateway, store.clone(), sync.clone());
        ctl.start("sync-down").unwrap();
        ctl.message("hello").await.unwrap();

        assert!(matches!(ctl.end().await.unwrap(), EndOutcome::Finalized(_)));
        let stored = store.records.lock().unwrap().get("sync-down").cloned().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Greeting"));
        assert_eq!(stored.summary.as_deref(), Some("A greeting."));
        assert_eq!(sync.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_user_turn() {
        let gateway = MockGateway::default();
        gateway
            .replies
            .lock()
            .unwrap()
            .push_back(Err(LlmError::RateLimited {
                retry_after_ms: Some(500),
            }));
        let mut ctl = controller(gateway, Arc::default(), Arc::default());
        ctl.start("flaky").unwrap();

        let err = ctl.message("hello?").await.unwrap_err();
        assert!(matches!(err, SessionError::Gateway(LlmError::RateLimited { .. })));
        assert_eq!(ctl.state(), SessionState::Active);
        assert_eq!(ctl.history().len(), 1);
        assert_eq!(ctl.history()[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_store_failure_leaves_session_active_for_retry() {
        let store = Arc::new(MemoryStore::default());
        *store.fail_save.lock().unwrap() = true;
        let gateway = MockGateway::scripted(&["hi"], "Title", "Summary");
        let mut ctl = controller(gateway, store.clone(), Arc::default());
        ctl.start("retry").unwrap();
        ctl.message("hello").await.unwrap();

        assert!(matches!(ctl.end().await.unwrap_err(), SessionError::Storage(_)));
        assert_eq!(ctl.state(), SessionState::Active);

        *store.fail_save.lock().unwrap() = false;
        assert!(matches!(ctl.end().await.unwrap(), EndOutcome::Finalized(_)));
        assert_eq!(ctl.state(), SessionState::Ended);
    }

    #[tokio::test]
    async fn test_title_failure_skips_sync_and_save() {
        let store = Arc::new(MemoryStore::default());
        let sync = Arc::new(MockSync::default());
        let gateway = MockGateway::scripted(&["hi"], "unused", "unused");
        *gateway.title.lock().unwrap() = None;
        let mut ctl = controller(gateway, store.clone(), sync.clone());
        ctl.start("no-title").unwrap();
        ctl.message("hello").await.unwrap();

        assert!(matches!(ctl.end().await.unwrap_err(), SessionError::Gateway(_)));
        assert!(sync.calls.lock().unwrap().is_empty());
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert_eq!(ctl.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_resume_restores_saved_history() {
        let store = Arc::new(MemoryStore::default());
        let gateway = MockGateway::scripted(&["Hi there!"], "Greeting", "A greeting.");
        let mut first = controller(gateway, store.clone(), Arc::default());
        first.start("thread-7").unwrap();
        first.message("Hello").await.unwrap();
        first.end().await.unwrap();
        let before = first.history().to_vec();

        let mut second = controller(MockGateway::default(), store.clone(), Arc::default());
        let outcome = second.resume("thread-7").await.unwrap();

        assert_eq!(outcome, ResumeOutcome::Restored { messages: 2 });
        assert_eq!(second.state(), SessionState::Active);
        assert_eq!(second.session_id(), Some("thread-7"));
        assert_eq!(second.history(), before.as_slice());
    }

    #[tokio::test]
    async fn test_resume_miss_starts_fresh() {
        let mut ctl = controller(MockGateway::default(), Arc::default(), Arc::default());
        assert_eq!(ctl.resume("unknown").await.unwrap(), ResumeOutcome::Fresh);
        assert_eq!(ctl.state(), SessionState::Active);
        assert!(ctl.history().is_empty());
    }

    #[tokio::test]
    async fn test_resume_unreadable_record_starts_fresh() {
        let store = Arc::new(MemoryStore {
            fail_load: true,
            ..Default::default()
        });
        let mut ctl = controller(MockGateway::default(), store, Arc::default());
        assert_eq!(ctl.resume("broken").await.unwrap(), ResumeOutcome::Fresh);
        assert_eq!(ctl.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_events_rejected_in_wrong_state() {
        let mut ctl = controller(MockGateway::default(), Arc::default(), Arc::default());

        assert!(matches!(
            ctl.message("too early").await.unwrap_err(),
            SessionError::InvalidState { operation: "message", state: SessionState::Idle }
        ));
        assert!(matches!(
            ctl.end().await.unwrap_err(),
            SessionError::InvalidState { operation: "end", .. }
        ));

        ctl.start("s").unwrap();
        assert!(matches!(
            ctl.start("again").unwrap_err(),
            SessionError::InvalidState { operation: "start", state: SessionState::Active }
        ));
        assert!(ctl.resume("other").await.is_err());
    }

    #[tokio::test]
    async fn test_message_after_end_is_rejected() {
        let gateway = MockGateway::scripted(&["hi"], "T", "S");
        let mut ctl = controller(gateway, Arc::default(), Arc::default());
        ctl.start("done").unwrap();
        ctl.message("hello").await.unwrap();
        ctl.end().await.unwrap();

        assert!(matches!(
            ctl.message("more").await.unwrap_err(),
            SessionError::InvalidState { state: SessionState::Ended, .. }
        ));
        assert_eq!(ctl.history().len(), 2);
    }

    #[tokio::test]
    async fn test_resume_keeps_history_across_clock_step_back() {
        let at = |h: u32, m: u32| {
            NaiveDate::from_ymd_opt(2024, 11, 3)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap()
        };
        let history = vec![
            ChatMessage::user("before fall-back", at(1, 58)),
            ChatMessage::assistant("after fall-back", at(1, 10)),
            ChatMessage::user("still here", at(1, 11)),
        ];
        let store = Arc::new(MemoryStore::default());
        store.records.lock().unwrap().insert(
            "legacy".to_string(),
            SessionRecord {
                session_id: "legacy".to_string(),
                history: history.clone(),
                title: None,
                summary: None,
                created_at: at(1, 58),
                ended_at: None,
            },
        );

        let gateway = MockGateway::scripted(&["welcome back"], "T", "S");
        let mut ctl = SessionController::new(Arc::new(gateway), store, Arc::<MockSync>::default())
            .with_clock(move || at(1, 12));

        assert_eq!(
            ctl.resume("legacy").await.unwrap(),
            ResumeOutcome::Restored { messages: 3 }
        );
        assert_eq!(ctl.history(), history.as_slice());

        ctl.message("continue").await.unwrap();
        assert_eq!(ctl.history().len(), 5);
    }

    #[tokio::test]
    async fn test_unusable_id_rejected_before_chatting() {
        let store = Arc::new(MemoryStore::default());
        let mut ctl = controller(MockGateway::default(), store.clone(), Arc::default());

        assert!(matches!(
            ctl.start("team/alpha").unwrap_err(),
            SessionError::Storage(StoreError::InvalidKey(_))
        ));
        assert_eq!(ctl.state(), SessionState::Idle);
        assert!(matches!(
            ctl.resume("team/alpha").await.unwrap_err(),
            SessionError::Storage(StoreError::InvalidKey(_))
        ));
        assert_eq!(ctl.state(), SessionState::Idle);

        ctl.start("team-alpha").unwrap();
        assert_eq!(ctl.state(), SessionState::Active);
    }
}
