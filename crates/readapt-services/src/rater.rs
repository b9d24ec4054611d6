//! LLM-backed difficulty rater.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use readapt_core::model::{DifficultyScore, DIFFICULTY_MAX, DIFFICULTY_MIN};
use readapt_core::parse::parse_difficulty;
use readapt_core::traits::DifficultyRater;

use crate::backend::{GenerateRequest, LlmBackend};

/// Generation settings for difficulty rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaterConfig {
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_max_score")]
    pub max_score: f64,
}

fn default_max_tokens() -> u32 {
    10
}
fn default_min_score() -> f64 {
    DIFFICULTY_MIN
}
fn default_max_score() -> f64 {
    DIFFICULTY_MAX
}

impl Default for RaterConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            min_score: default_min_score(),
            max_score: default_max_score(),
        }
    }
}

/// Rates chunk difficulty on a lexile-like scale by asking an LLM.
pub struct LlmDifficultyRater {
    backend: Arc<dyn LlmBackend>,
    model: String,
    config: RaterConfig,
}

impl LlmDifficultyRater {
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>, config: RaterConfig) -> Self {
        Self {
            backend,
            model: model.into(),
            config,
        }
    }

    fn prompt(&self, text: &str) -> String {
        format!(
            "Rate the difficulty of the following text on a lexile-like scale from {} to {}. \
             Respond with only the numeric score (no units, no text).\n\n{}",
            self.config.min_score, self.config.max_score, text
        )
    }
}

#[async_trait]
impl DifficultyRater for LlmDifficultyRater {
    #[instrument(skip(self, text), fields(backend = self.backend.name(), len = text.len()))]
    async fn rate_difficulty(&self, text: &str) -> anyhow::Result<Option<DifficultyScore>> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: self.prompt(text),
            system_prompt: None,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response = self.backend.generate(&request).await?;

        let score = parse_difficulty(&response.content)
            .map(|raw| raw.clamp(self.config.min_score, self.config.max_score))
            .and_then(DifficultyScore::new);
        match score {
            Some(score) => debug!(%score, "chunk rated"),
            None => warn!(output = %response.content, "difficulty output was not numeric"),
        }
        Ok(score)
    }
}
