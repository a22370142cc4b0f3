//! Global configuration types for chatkeep.
//!
//! `ChatkeepConfig` represents the top-level `config.toml`. Credentials are
//! never read from the file; they come from the environment and are redacted
//! from `Debug` output.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::chat::LogFormat;

/// Default system instruction prefixed to every reply request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Default Azure OpenAI REST API version.
pub const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

/// Top-level configuration. All fields have defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatkeepConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub thread_db: ThreadDbConfig,
}

/// Where and how session records are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one `<session_id>.json` per session.
    /// Defaults to `{data_dir}/sessions`.
    #[serde(default)]
    pub sessions_dir: Option<PathBuf>,

    /// Representation used for `full_log` in newly written records.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Completion service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Azure OpenAI resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Deployment identifier.
    #[serde(default)]
    pub deployment: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Environment-only.
    #[serde(skip)]
    pub api_key: Option<String>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub temperature: Option<f64>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: default_api_version(),
            api_key: None,
            system_prompt: default_system_prompt(),
            max_tokens: None,
            temperature: None,
        }
    }
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("system_prompt", &self.system_prompt)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Relational store holding the `"Thread"` table.
#[derive(Clone, Serialize, Deserialize)]
pub struct ThreadDbConfig {
    /// Full connection URL; takes precedence over the individual fields.
    /// Environment-only because it usually embeds a password.
    #[serde(skip)]
    pub url: Option<String>,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default)]
    pub user: Option<String>,

    /// Environment-only.
    #[serde(skip)]
    pub password: Option<String>,

    #[serde(default)]
    pub database: Option<String>,
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

impl Default for ThreadDbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_db_host(),
            port: default_db_port(),
            user: None,
            password: None,
            database: None,
        }
    }
}

impl ThreadDbConfig {
    /// Build the connection URL, or `None` when the store is not configured.
    ///
    /// Without an explicit `url`, both `user` and `database` are required and
    /// a Postgres URL is assembled from the parts.
    pub fn connection_url(&self) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        let user = self.user.as_deref()?;
        let database = self.database.as_deref()?;

        let credentials = match self.password.as_deref() {
            Some(password) => format!("{}:{}", encode(user), encode(password)),
            None => encode(user).into_owned(),
        };
        Some(format!(
            "postgres://{credentials}@{}:{}/{}",
            self.host,
            self.port,
            encode(database)
        ))
    }
}

impl fmt::Debug for ThreadDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadDbConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .finish()
    }
}
