//! LLM provider implementations

use async_trait::async_trait;

mod error;
mod ollama;
mod types;

pub use error::LlmError;
pub use ollama::{OllamaModelInfo, OllamaProvider};
pub use types::*;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model the provider talks to
    fn model(&self) -> &str;

    /// Send a chat completion request (non-streaming)
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError>;
}
