//! LLM integration for the mailroom agent.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint. Conversation
//! histories are kept in that wire format so stored threads can be replayed
//! to the model unchanged.

pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use openai::OpenAiProvider;
pub use provider::*;
pub use retry::RetryPolicy;

use std::sync::Arc;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub api_base: String,
    pub model: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiProvider::new(&config.api_base, config.api_key.clone(), &config.model)?;
    tracing::info!("Using OpenAI-compatible API at {} (model: {})", config.api_base, config.model);
    Ok(Arc::new(provider))
}
