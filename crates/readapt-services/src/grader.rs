//! LLM-backed response grader.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use readapt_core::model::{RATING_MAX, RATING_MIN};
use readapt_core::parse::parse_grade;
use readapt_core::traits::{Grade, GradeRequest, ResponseGrader};

use crate::backend::{GenerateRequest, LlmBackend};
use crate::error::ServiceError;

/// Generation settings for grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraderConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens() -> u32 {
    512
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Grades learner answers by asking an LLM for a review and a rating.
pub struct LlmResponseGrader {
    backend: Arc<dyn LlmBackend>,
    model: String,
    config: GraderConfig,
}

impl LlmResponseGrader {
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>, config: GraderConfig) -> Self {
        Self {
            backend,
            model: model.into(),
            config,
        }
    }
}

fn grading_prompt(request: &GradeRequest) -> String {
    let pairs: String = request
        .pairs()
        .enumerate()
        .map(|(i, (question, answer))| {
            format!("Question {}: {}\nResponse: {}\n", i + 1, question, answer)
        })
        .collect();
    format!(
        "{}\n{pairs}\nGenerate a JSON object with two keys: 'review' (a short evaluation message for the learner) \
         and 'rating' (integer between {RATING_MIN} and {RATING_MAX}; positive for correct, negative for \
         misunderstanding, 0 neutral). Respond with only the JSON object.",
        request.chunk()
    )
}

#[async_trait]
impl ResponseGrader for LlmResponseGrader {
    #[instrument(skip(self, request), fields(backend = self.backend.name(), questions = request.questions().len()))]
    async fn grade_responses(&self, request: &GradeRequest) -> anyhow::Result<Grade> {
        let generate = GenerateRequest {
            model: self.model.clone(),
            prompt: grading_prompt(request),
            system_prompt: None,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response = self.backend.generate(&generate).await?;

        let grade = parse_grade(&response.content).ok_or_else(|| {
            ServiceError::MalformedResponse(format!("grader output is not a review: {}", response.content))
        })?;
        debug!(rating = ?grade.rating.map(|r| r.value()), "answers graded");
        Ok(grade)
    }
}
