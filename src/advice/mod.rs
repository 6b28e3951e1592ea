//! AI advice collaborator
//!
//! Forwards a prediction to an OpenAI-compatible chat-completions service and
//! returns a short text answer. The feature is optional: without an API key
//! the service is [`AdviceService::Disabled`] and never touches the network.
//! Every failure (network, timeout, non-2xx status, malformed body) is
//! downgraded to [`AdviceOutcome::Unavailable`] so the prediction flow is never
//! interrupted.

pub mod client;
pub mod prompt;
pub mod session;

use serde::{Deserialize, Serialize};

pub use client::{AdviceError, ChatClient, ChatMessage, Role};
pub use prompt::{clean_markdown, display_label, follow_up_prompt, initial_prompt};
pub use session::{AdviceService, AdviceSession};

/// Default chat-completions base URL
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model name
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat:free";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Advice service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdviceConfig {
    /// API key; absent or blank disables the feature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AdviceConfig {
    /// The API key, if set and not blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key().is_some()
    }
}

/// Result of one advice request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdviceOutcome {
    /// Reply text from the service
    Advice(String),
    /// The service failed; static advice still applies
    Unavailable(String),
    /// No API key configured
    Disabled,
}

impl AdviceOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            AdviceOutcome::Advice(text) => Some(text),
            _ => None,
        }
    }
}
