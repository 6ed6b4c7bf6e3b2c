//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.

pub mod providers;

use thiserror::Error;
use tracing::debug;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Response ──────────────────────────────────────────────────────────────────

/// Token accounting reported by the provider, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Option<LlmUsage>,
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// Send `content` (with an optional system prompt) and return the reply.
    ///
    /// With `json_mode` the provider is asked to return a single JSON object.
    pub async fn complete(
        &self,
        content: &str,
        system: Option<&str>,
        json_mode: bool,
    ) -> Result<LlmResponse, ProviderError> {
        let resp = match self {
            LlmProvider::Dummy(p) => p.complete(content, system).await?,
            LlmProvider::OpenAiCompatible(p) => p.complete(content, system, json_mode).await?,
        };
        if let Some(usage) = resp.usage {
            debug!(
                provider = self.name(),
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "llm usage"
            );
        }
        Ok(resp)
    }

    /// Short name used in logs and the health endpoint.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::OpenAiCompatible(_) => "openai",
        }
    }
}

/// The outermost `{ ... }` span of a reply, dropping any code fences or
/// chatter a model wraps around its JSON.
pub fn json_object_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
