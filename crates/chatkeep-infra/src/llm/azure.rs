//! Azure OpenAI completion provider.
//!
//! Uses [`async_openai`] with an [`AzureConfig`]: requests are routed to a
//! deployment under the resource endpoint, so the request's `model` field is
//! informational only.

use async_openai::Client;
use async_openai::config::AzureConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, FinishReason,
};
use secrecy::{ExposeSecret, SecretString};

use chatkeep_core::llm::provider::LlmProvider;
use chatkeep_types::config::CompletionConfig;
use chatkeep_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, Message, MessageRole, StopReason, Usage,
};

/// Connection settings for one Azure OpenAI deployment.
pub struct AzureSettings {
    pub endpoint: String,
    pub api_key: SecretString,
    pub deployment: String,
    pub api_version: String,
}

impl AzureSettings {
    /// Extract settings from config, failing when endpoint, key, or
    /// deployment is missing.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, LlmError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| LlmError::InvalidRequest("AZURE_OPENAI_ENDPOINT is not set".into()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::InvalidRequest("AZURE_OPENAI_KEY is not set".into()))?;
        let deployment = config
            .deployment
            .clone()
            .ok_or_else(|| LlmError::InvalidRequest("AZURE_DEPLOYMENT_NAME is not set".into()))?;

        Ok(Self {
            endpoint,
            api_key: SecretString::from(api_key),
            deployment,
            api_version: config.api_version.clone(),
        })
    }
}

/// Completion provider for an Azure OpenAI deployment.
///
/// Does NOT derive Debug: the client holds the API key.
pub struct AzureOpenAiProvider {
    client: Client<AzureConfig>,
    deployment: String,
}

impl AzureOpenAiProvider {
    pub fn new(settings: AzureSettings) -> Self {
        let azure_config = AzureConfig::new()
            .with_api_base(settings.endpoint)
            .with_api_version(settings.api_version)
            .with_deployment_id(settings.deployment.clone())
            .with_api_key(settings.api_key.expose_secret());

        Self {
            client: Client::with_config(azure_config),
            deployment: settings.deployment,
        }
    }

    pub fn from_config(config: &CompletionConfig) -> Result<Self, LlmError> {
        AzureSettings::from_config(config).map(Self::new)
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    fn build_request(&self, request: &CompletionRequest) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(system_message(system));
        }
        messages.extend(request.messages.iter().map(to_openai_message));

        CreateChatCompletionRequest {
            model: self.deployment.clone(),
            messages,
            max_completion_tokens: request.max_tokens,
            temperature: request.temperature.map(|t| t as f32),
            ..Default::default()
        }
    }
}

fn system_message(content: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(content.to_string()),
        name: None,
    })
}

fn to_openai_message(msg: &Message) -> ChatCompletionRequestMessage {
    match msg.role {
        MessageRole::System => system_message(&msg.content),
        MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
            name: None,
        }),
        MessageRole::Assistant => {
            #[allow(deprecated)]
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                    msg.content.clone(),
                )),
                refusal: None,
                name: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

impl LlmProvider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        "azure_openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let oai_request = self.build_request(request);

        let response = self
            .client
            .chat()
            .create(oai_request)
            .await
            .map_err(map_openai_error)?;

        let choice = response.choices.first().ok_or(LlmError::EmptyCompletion)?;
        let content = choice.message.content.clone().unwrap_or_default();

        let stop_reason = match choice.finish_reason {
            Some(FinishReason::Length) => StopReason::MaxTokens,
            Some(FinishReason::ContentFilter) => StopReason::ContentFilter,
            Some(FinishReason::ToolCalls) | Some(FinishReason::FunctionCall) => StopReason::ToolUse,
            Some(FinishReason::Stop) | None => StopReason::EndTurn,
        };

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason,
            usage,
        })
    }
}

/// Map an `async_openai::error::OpenAIError` to an [`LlmError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "401"
                || code == "invalid_api_key"
                || error_type == "authentication_error"
                || api_err.message.contains("Access denied due to invalid subscription key")
            {
                LlmError::AuthenticationFailed
            } else if code == "429"
                || code == "rate_limit_exceeded"
                || error_type == "rate_limit_error"
            {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else if code == "context_length_exceeded"
                || api_err.message.contains("maximum context length")
            {
                LlmError::ContextLengthExceeded
            } else if code == "DeploymentNotFound" {
                LlmError::InvalidRequest(api_err.message.clone())
            } else if code == "server_error" || code == "503" {
                LlmError::Overloaded(api_err.message.clone())
            } else {
                LlmError::Provider {
                    message: err.to_string(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited {
                retry_after_ms: None,
            },
            Some(503) => LlmError::Overloaded(err.to_string()),
            _ => LlmError::Provider {
                message: err.to_string(),
            },
        },
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Deserialization(format!("failed to parse response: {content}"))
        }
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}
