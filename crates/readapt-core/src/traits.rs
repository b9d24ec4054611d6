//! Collaborator traits for the external services the control loop talks to.
//!
//! These async traits are implemented by the `readapt-services` crate over
//! HTTP. The core never inspects transport details; it only sees results or
//! `anyhow` errors, which it degrades according to its error policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::level::SimplificationLevel;
use crate::model::{Chunk, DifficultyScore, Rating};

// ---------------------------------------------------------------------------
// Chunk source
// ---------------------------------------------------------------------------

/// Splits source text into ordered chunks.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn chunk_text(&self, text: &str) -> anyhow::Result<Vec<Chunk>>;
}

// ---------------------------------------------------------------------------
// Difficulty rater
// ---------------------------------------------------------------------------

/// Scores how hard a chunk is to read.
#[async_trait]
pub trait DifficultyRater: Send + Sync {
    /// Rate a chunk. `Ok(None)` means the rater could not score it.
    async fn rate_difficulty(&self, text: &str) -> anyhow::Result<Option<DifficultyScore>>;
}

// ---------------------------------------------------------------------------
// Response grader
// ---------------------------------------------------------------------------

/// A validated grading request: one answer per question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRequest {
    chunk: String,
    questions: Vec<String>,
    answers: Vec<String>,
}

impl GradeRequest {
    /// Pair questions with answers.
    ///
    /// Fails with [`CoreError::MismatchedAnswers`] when the lengths differ, so
    /// an invalid request never reaches a grader.
    pub fn new(
        chunk: impl Into<String>,
        questions: Vec<String>,
        answers: Vec<String>,
    ) -> Result<Self, CoreError> {
        if questions.len() != answers.len() {
            return Err(CoreError::MismatchedAnswers {
                questions: questions.len(),
                answers: answers.len(),
            });
        }
        Ok(Self {
            chunk: chunk.into(),
            questions,
            answers,
        })
    }

    pub fn chunk(&self) -> &str {
        &self.chunk
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Question/answer pairs in order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.questions
            .iter()
            .zip(&self.answers)
            .map(|(q, a)| (q.as_str(), a.as_str()))
    }
}

/// Grader verdict for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    /// Short evaluation message for the learner.
    pub review: String,
    /// Comprehension rating. `None` when the grader's rating was unparseable.
    pub rating: Option<Rating>,
}

/// Scores a learner's answers against the chunk they read.
#[async_trait]
pub trait ResponseGrader: Send + Sync {
    async fn grade_responses(&self, request: &GradeRequest) -> anyhow::Result<Grade>;
}

// ---------------------------------------------------------------------------
// Text rewriter
// ---------------------------------------------------------------------------

/// Rewrites a chunk at a given simplification strength.
#[async_trait]
pub trait TextRewriter: Send + Sync {
    /// Return the simplified text. Only called with nonzero levels.
    async fn rewrite_chunk(&self, text: &str, level: SimplificationLevel)
        -> anyhow::Result<String>;
}

// ---------------------------------------------------------------------------
// Question generator
// ---------------------------------------------------------------------------

/// Produces open-ended comprehension questions for a chunk.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate_questions(&self, text: &str) -> anyhow::Result<Vec<String>>;
}

/// Allowed number of questions per chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for QuestionBounds {
    fn default() -> Self {
        Self { min: 2, max: 5 }
    }
}

impl QuestionBounds {
    /// Trim blank entries and cut the list down to `max`.
    ///
    /// Lists shorter than `min` are returned as-is; callers decide whether a
    /// short list is acceptable.
    pub fn apply(&self, questions: Vec<String>) -> Vec<String> {
        questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(self.max)
            .collect()
    }

    pub fn satisfied_by(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}
