//! LLM-backed text rewriter.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use readapt_core::level::SimplificationLevel;
use readapt_core::parse::strip_code_fences;
use readapt_core::traits::TextRewriter;

use crate::backend::{GenerateRequest, LlmBackend};
use crate::error::ServiceError;

/// Generation settings for rewriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriterConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Upper bound on the token budget; the budget is otherwise twice the
    /// input length in characters.
    #[serde(default = "default_max_tokens_cap")]
    pub max_tokens_cap: u32,
}

fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens_cap() -> u32 {
    8192
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens_cap: default_max_tokens_cap(),
        }
    }
}

/// Simplifies chunk text by a percentage while keeping its length.
pub struct LlmTextRewriter {
    backend: Arc<dyn LlmBackend>,
    model: String,
    config: RewriterConfig,
}

impl LlmTextRewriter {
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>, config: RewriterConfig) -> Self {
        Self {
            backend,
            model: model.into(),
            config,
        }
    }

    fn token_budget(&self, text: &str) -> u32 {
        let doubled = text.chars().count().saturating_mul(2);
        u32::try_from(doubled)
            .unwrap_or(u32::MAX)
            .clamp(1, self.config.max_tokens_cap.max(1))
    }
}

#[async_trait]
impl TextRewriter for LlmTextRewriter {
    #[instrument(skip(self, text), fields(backend = self.backend.name()))]
    async fn rewrite_chunk(&self, text: &str, level: SimplificationLevel) -> anyhow::Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: format!(
                "Simplify the following text by {}% while preserving its length and nuances. \
                 Return only the simplified text.\n\n{}",
                level.percent(),
                text
            ),
            system_prompt: None,
            max_tokens: self.token_budget(text),
            temperature: self.config.temperature,
        };
        let response = self.backend.generate(&request).await?;

        let rewritten = strip_code_fences(&response.content);
        if rewritten.is_empty() {
            return Err(ServiceError::MalformedResponse("rewriter returned empty text".into()).into());
        }
        debug!(before = text.len(), after = rewritten.len(), "chunk rewritten");
        Ok(rewritten)
    }
}
