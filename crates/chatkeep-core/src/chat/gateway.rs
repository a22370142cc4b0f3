//! Completion gateway: the three requests a session makes to the completion
//! service (reply, title, summary).
//!
//! `LlmGateway` builds the requests and post-processes the responses on top
//! of any `BoxLlmProvider`. No retries are performed here.

use chatkeep_types::chat::ChatMessage;
use chatkeep_types::config::{CompletionConfig, DEFAULT_SYSTEM_PROMPT};
use chatkeep_types::llm::{CompletionRequest, LlmError, Message, MessageRole};

use crate::llm::box_provider::BoxLlmProvider;

/// System instruction for title generation.
const TITLE_SYSTEM_PROMPT: &str = "Write a short 5\u{2013}8 word title for this chat.";

/// System instruction for summary generation.
const SUMMARY_SYSTEM_PROMPT: &str = "Summarize this chat in 1\u{2013}2 short sentences.";

/// Requests a session makes to the completion service.
pub trait CompletionGateway: Send + Sync {
    /// Next assistant reply given the full history (system instruction is
    /// prefixed by the gateway).
    fn reply(
        &self,
        history: &[ChatMessage],
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;

    /// Short title for a rendered log.
    fn title(
        &self,
        log_text: &str,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;

    /// One or two sentence summary of a rendered log.
    fn summarize(
        &self,
        log_text: &str,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;
}

/// Gateway backed by an `LlmProvider`.
pub struct LlmGateway {
    provider: BoxLlmProvider,
    model: String,
    system_prompt: String,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
}

impl LlmGateway {
    pub fn new(provider: BoxLlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Build a gateway using the prompt and sampling settings from config.
    pub fn from_config(provider: BoxLlmProvider, config: &CompletionConfig) -> Self {
        Self {
            provider,
            model: config.deployment.clone().unwrap_or_default(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn request(&self, system: &str, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages,
            system: Some(system.to_string()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl CompletionGateway for LlmGateway {
    #[tracing::instrument(
        name = "gateway_reply",
        skip(self, history),
        fields(provider = %self.provider.name(), message_count = history.len())
    )]
    async fn reply(&self, history: &[ChatMessage]) -> Result<String, LlmError> {
        let messages = history.iter().map(ChatMessage::to_llm_message).collect();
        let request = self.request(&self.system_prompt, messages);

        let response = self.provider.complete(&request).await?;
        tracing::debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = %response.stop_reason,
            "Reply received"
        );
        Ok(response.content)
    }

    #[tracing::instrument(
        name = "gateway_title",
        skip(self, log_text),
        fields(provider = %self.provider.name(), log_len = log_text.len())
    )]
    async fn title(&self, log_text: &str) -> Result<String, LlmError> {
        let request = self.request(
            TITLE_SYSTEM_PROMPT,
            vec![Message::new(MessageRole::User, log_text)],
        );

        let response = self.provider.complete(&request).await?;
        let title = clean_title(&response.content);
        if title.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(title)
    }

    #[tracing::instrument(
        name = "gateway_summarize",
        skip(self, log_text),
        fields(provider = %self.provider.name(), log_len = log_text.len())
    )]
    async fn summarize(&self, log_text: &str) -> Result<String, LlmError> {
        let request = self.request(
            SUMMARY_SYSTEM_PROMPT,
            vec![Message::new(MessageRole::User, log_text)],
        );

        let response = self.provider.complete(&request).await?;
        Ok(response.content.trim().to_string())
    }
}

/// Trim whitespace and surrounding quotes, then title-case.
fn clean_title(raw: &str) -> String {
    let stripped = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    title_case(stripped)
}

/// Uppercase the first letter of every word and lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = c.is_whitespace() || c == '-';
        }
    }
    out
}
