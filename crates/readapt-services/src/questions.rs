//! LLM-backed question generator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use readapt_core::parse::parse_questions;
use readapt_core::traits::{QuestionBounds, QuestionGenerator};

use crate::backend::{GenerateRequest, LlmBackend};
use crate::error::ServiceError;

/// Generation settings for comprehension questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionsConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_min")]
    pub min: usize,
    #[serde(default = "default_max")]
    pub max: usize,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    256
}
fn default_min() -> usize {
    QuestionBounds::default().min
}
fn default_max() -> usize {
    QuestionBounds::default().max
}

impl Default for QuestionsConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            min: default_min(),
            max: default_max(),
        }
    }
}

impl QuestionsConfig {
    pub fn bounds(&self) -> QuestionBounds {
        QuestionBounds {
            min: self.min,
            max: self.max,
        }
    }
}

/// Generates open-ended comprehension questions with an LLM.
pub struct LlmQuestionGenerator {
    backend: Arc<dyn LlmBackend>,
    model: String,
    config: QuestionsConfig,
}

impl LlmQuestionGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>, config: QuestionsConfig) -> Self {
        Self {
            backend,
            model: model.into(),
            config,
        }
    }
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    #[instrument(skip(self, text), fields(backend = self.backend.name()))]
    async fn generate_questions(&self, text: &str) -> anyhow::Result<Vec<String>> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: format!(
                "Read the following text and generate between {} and {} open-ended questions based on \
                 its content. Return the questions as a JSON array of strings.\n\n{}",
                self.config.min, self.config.max, text
            ),
            system_prompt: None,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response = self.backend.generate(&request).await?;

        let bounds = self.config.bounds();
        let questions = bounds.apply(parse_questions(&response.content));
        if questions.is_empty() {
            return Err(ServiceError::MalformedResponse("no questions in output".into()).into());
        }
        if !bounds.satisfied_by(questions.len()) {
            warn!(
                count = questions.len(),
                min = bounds.min,
                "fewer questions than requested"
            );
        }
        Ok(questions)
    }
}
