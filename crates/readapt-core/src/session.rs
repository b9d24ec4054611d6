//! Reading session orchestration.
//!
//! A session owns one [`AdaptiveController`] and walks a chunked text in
//! strict order:
//!
//! 1. `start` delivers the first chunk unmodified (no rating yet) with its questions.
//! 2. Each `submit_answers` grades the answers for the pending chunk, then
//!    adapts and delivers the next chunk using that rating.
//! 3. After the last chunk is graded the session is finished.
//!
//! Collaborator failures never surface to the learner: grading falls back to
//! a generic review with no rating, question generation falls back to a
//! generic question, and rewriting falls back to the original text.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::join;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::controller::{AdaptedChunk, AdaptiveController, Delivery};
use crate::elo::{ReadingElo, ReadingLevel};
use crate::error::CoreError;
use crate::level::SimplificationLevel;
use crate::model::{Chunk, DifficultyScore, Rating};
use crate::performance::PerformanceState;
use crate::policy::{DecisionState, SimplificationPolicy};
use crate::traits::{
    ChunkSource, DifficultyRater, GradeRequest, QuestionBounds, QuestionGenerator, ResponseGrader,
    TextRewriter,
};

/// Review shown when the grader is unavailable or its output is unusable.
pub const GENERIC_REVIEW: &str = "We couldn't review your answers this time. Keep going, and take a moment to reread anything that felt unclear.";

/// Question asked when question generation fails.
pub const FALLBACK_QUESTION: &str = "In your own words, what is the main idea of this passage?";

/// The external services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub chunker: Arc<dyn ChunkSource>,
    pub rater: Arc<dyn DifficultyRater>,
    pub grader: Arc<dyn ResponseGrader>,
    pub rewriter: Arc<dyn TextRewriter>,
    pub questions: Arc<dyn QuestionGenerator>,
}

/// A chunk handed to the learner together with its questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredChunk {
    pub chunk: AdaptedChunk,
    pub questions: Vec<String>,
}

/// Feedback for one round of answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub message: String,
    /// `None` if the grader failed or its rating was unparseable.
    pub rating: Option<Rating>,
    /// Whether the generic fallback review was used.
    pub degraded: bool,
}

/// Result of submitting answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub review: Review,
    /// The next chunk, or `None` when the session just finished.
    pub next: Option<DeliveredChunk>,
}

/// History entry for a graded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub index: usize,
    pub level: SimplificationLevel,
    pub delivery: Delivery,
    pub difficulty: Option<DifficultyScore>,
    pub rating: Option<Rating>,
    pub graded_at: DateTime<Utc>,
}

/// End-of-session (or mid-session) report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub policy: String,
    pub started_at: DateTime<Utc>,
    pub chunks_total: usize,
    pub chunks_delivered: usize,
    pub chunks_rewritten: usize,
    pub rewrite_fallbacks: usize,
    pub unrated_chunks: usize,
    pub performance: PerformanceState,
    pub state: DecisionState,
    pub elo: ReadingElo,
    pub reading_level: ReadingLevel,
    pub finished: bool,
    pub history: Vec<ChunkRecord>,
}

/// One learner reading one text.
pub struct ReadingSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    chunks: Vec<Chunk>,
    next_index: usize,
    controller: AdaptiveController,
    questions: Arc<dyn QuestionGenerator>,
    grader: Arc<dyn ResponseGrader>,
    bounds: QuestionBounds,
    pending: Option<DeliveredChunk>,
    finished: bool,
    elo: ReadingElo,
    history: Vec<ChunkRecord>,
}

impl ReadingSession {
    /// Create a session over pre-chunked text.
    pub fn new(
        chunks: Vec<Chunk>,
        controller: AdaptiveController,
        questions: Arc<dyn QuestionGenerator>,
        grader: Arc<dyn ResponseGrader>,
    ) -> Result<Self, CoreError> {
        if chunks.is_empty() {
            return Err(CoreError::EmptyText);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            chunks,
            next_index: 0,
            controller,
            questions,
            grader,
            bounds: QuestionBounds::default(),
            pending: None,
            finished: false,
            elo: ReadingElo::default(),
            history: Vec::new(),
        })
    }

    /// Chunk `text` with the collaborators' chunker and build a session.
    pub async fn open(
        text: &str,
        collaborators: &Collaborators,
        policy: Arc<dyn SimplificationPolicy>,
    ) -> anyhow::Result<Self> {
        let mut chunks = collaborators
            .chunker
            .chunk_text(text)
            .await
            .context("failed to chunk source text")?;
        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.index = index;
        }

        let controller = AdaptiveController::new(policy, Arc::clone(&collaborators.rewriter))
            .with_rater(Arc::clone(&collaborators.rater));
        let session = Self::new(
            chunks,
            controller,
            Arc::clone(&collaborators.questions),
            Arc::clone(&collaborators.grader),
        )?;
        info!(
            session = %session.id,
            chunks = session.chunks.len(),
            policy = session.controller.policy_name(),
            "reading session opened"
        );
        Ok(session)
    }

    pub fn with_question_bounds(mut self, bounds: QuestionBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Carry a learner's ELO over from earlier sessions.
    pub fn with_elo(mut self, elo: ReadingElo) -> Self {
        self.elo = elo;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The chunk awaiting answers, if any.
    pub fn pending(&self) -> Option<&DeliveredChunk> {
        self.pending.as_ref()
    }

    pub fn controller(&self) -> &AdaptiveController {
        &self.controller
    }

    /// Deliver the first chunk.
    pub async fn start(&mut self) -> Result<DeliveredChunk, CoreError> {
        if self.next_index > 0 {
            return Err(CoreError::SessionAlreadyStarted);
        }
        let first = self.chunks[0].clone();
        let difficulty = self.controller.assess(&first).await;
        let adapted = self.controller.open_chunk(&first, difficulty).await;
        Ok(self.deliver(adapted).await)
    }

    /// Grade answers for the pending chunk and deliver the next one.
    ///
    /// Mismatched answer counts are rejected before any collaborator is
    /// called, and leave the pending chunk in place.
    pub async fn submit_answers(&mut self, answers: Vec<String>) -> Result<AnswerOutcome, CoreError> {
        if self.finished {
            return Err(CoreError::SessionFinished);
        }
        let pending = self.pending.as_ref().ok_or(CoreError::SessionNotStarted)?;
        let request = GradeRequest::new(
            pending.chunk.text.clone(),
            pending.questions.clone(),
            answers,
        )?;

        let next_chunk = self.chunks.get(self.next_index).cloned();
        // Grading this chunk and rating the next one are independent.
        let (review, next_difficulty) = match &next_chunk {
            Some(chunk) => join(self.grade(&request), self.controller.assess(chunk)).await,
            None => (self.grade(&request).await, None),
        };

        if let Some(graded) = self.pending.take() {
            self.record(&graded.chunk, review.rating);
        }

        let next = match next_chunk {
            Some(chunk) => {
                let adapted = self
                    .controller
                    .adapt(&chunk, review.rating, next_difficulty)
                    .await;
                Some(self.deliver(adapted).await)
            }
            None => {
                if let Some(rating) = review.rating {
                    self.controller.fold_rating(rating).await;
                }
                self.finished = true;
                info!(session = %self.id, "reading session finished");
                None
            }
        };

        Ok(AnswerOutcome { review, next })
    }

    /// Snapshot of progress so far.
    pub async fn summary(&self) -> SessionSummary {
        let snapshot = self.controller.snapshot().await;
        let delivered = self
            .history
            .iter()
            .map(|r| r.delivery)
            .chain(self.pending.iter().map(|p| p.chunk.delivery));
        let (mut rewritten, mut fallbacks) = (0, 0);
        for delivery in delivered {
            match delivery {
                Delivery::Rewritten => rewritten += 1,
                Delivery::Fallback => fallbacks += 1,
                Delivery::Original => {}
            }
        }

        SessionSummary {
            id: self.id,
            policy: self.controller.policy_name().to_string(),
            started_at: self.started_at,
            chunks_total: self.chunks.len(),
            chunks_delivered: self.next_index,
            chunks_rewritten: rewritten,
            rewrite_fallbacks: fallbacks,
            unrated_chunks: self.history.iter().filter(|r| r.rating.is_none()).count(),
            performance: snapshot.performance,
            state: snapshot.state,
            elo: self.elo,
            reading_level: self.elo.level(),
            finished: self.finished,
            history: self.history.clone(),
        }
    }

    async fn deliver(&mut self, adapted: AdaptedChunk) -> DeliveredChunk {
        let questions = self.questions_for(&adapted).await;
        let delivered = DeliveredChunk {
            chunk: adapted,
            questions,
        };
        self.next_index += 1;
        self.pending = Some(delivered.clone());
        delivered
    }

    async fn questions_for(&self, chunk: &AdaptedChunk) -> Vec<String> {
        let questions = match self.questions.generate_questions(&chunk.text).await {
            Ok(questions) => self.bounds.apply(questions),
            Err(e) => {
                warn!(chunk = chunk.index, "question generation failed: {e:#}");
                Vec::new()
            }
        };

        if questions.is_empty() {
            return vec![FALLBACK_QUESTION.to_string()];
        }
        if !self.bounds.satisfied_by(questions.len()) {
            debug!(
                chunk = chunk.index,
                count = questions.len(),
                min = self.bounds.min,
                "fewer questions than requested"
            );
        }
        questions
    }

    async fn grade(&self, request: &GradeRequest) -> Review {
        match self.grader.grade_responses(request).await {
            Ok(grade) => {
                if grade.rating.is_none() {
                    warn!(session = %self.id, "grader rating unparseable, excluding from performance");
                }
                Review {
                    message: grade.review,
                    rating: grade.rating,
                    degraded: false,
                }
            }
            Err(e) => {
                warn!(session = %self.id, "grading failed: {e:#}");
                Review {
                    message: GENERIC_REVIEW.to_string(),
                    rating: None,
                    degraded: true,
                }
            }
        }
    }

    fn record(&mut self, chunk: &AdaptedChunk, rating: Option<Rating>) {
        if let (Some(difficulty), Some(rating)) = (chunk.difficulty, rating) {
            let change = self.elo.update(difficulty, rating.into());
            debug!(session = %self.id, change, elo = self.elo.rating, "reading elo updated");
        }
        self.history.push(ChunkRecord {
            index: chunk.index,
            level: chunk.level,
            delivery: chunk.delivery,
            difficulty: chunk.difficulty,
            rating,
            graded_at: Utc::now(),
        });
    }
}
