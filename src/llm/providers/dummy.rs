//! Dummy LLM provider — echoes input back prefixed with `[echo]`, or returns
//! a fixed scripted reply. Used to exercise LLM code paths without an API key.

use std::sync::Arc;

use crate::llm::{LlmResponse, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider {
    reply: Option<Arc<str>>,
}

impl DummyProvider {
    pub fn echo() -> Self {
        Self { reply: None }
    }

    /// Always answer with `reply`, whatever the prompt.
    pub fn scripted(reply: impl Into<Arc<str>>) -> Self {
        Self { reply: Some(reply.into()) }
    }

    pub async fn complete(&self, content: &str, _system: Option<&str>) -> Result<LlmResponse, ProviderError> {
        let text = match &self.reply {
            Some(r) => r.to_string(),
            None => format!("[echo] {content}"),
        };
        Ok(LlmResponse { text, usage: None })
    }
}
