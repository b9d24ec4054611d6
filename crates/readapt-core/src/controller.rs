//! The adaptive controller: per-session performance and decision state.
//!
//! Each step folds the previous chunk's rating (if any) into the running
//! mean, asks the session's policy for the next [`DecisionState`], and renders
//! the upcoming chunk at the resulting level. The fold and the policy
//! read-modify-write happen under one lock; collaborator I/O happens outside
//! it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::level::SimplificationLevel;
use crate::model::{Chunk, DifficultyScore, Rating};
use crate::performance::PerformanceState;
use crate::policy::{DecisionInput, DecisionState, SimplificationPolicy};
use crate::traits::{DifficultyRater, TextRewriter};

/// How the delivered text relates to the source chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Level was zero; the source text is delivered byte-for-byte.
    Original,
    /// The rewriter produced the delivered text.
    Rewritten,
    /// Rewriting was requested but failed; the source text is delivered.
    Fallback,
}

/// A chunk as delivered to the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptedChunk {
    /// Index of the source chunk.
    pub index: usize,
    /// Text shown to the learner.
    pub text: String,
    /// Level the engine selected for this chunk.
    pub level: SimplificationLevel,
    pub delivery: Delivery,
    /// Rated difficulty of the source chunk.
    pub difficulty: Option<DifficultyScore>,
    /// Running performance at decision time.
    pub performance: f64,
}

/// Serializable controller state, for hosts that persist sessions between
/// requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub performance: PerformanceState,
    pub state: DecisionState,
}

/// Session-scoped adaptive difficulty controller.
pub struct AdaptiveController {
    policy: Arc<dyn SimplificationPolicy>,
    rewriter: Arc<dyn TextRewriter>,
    rater: Option<Arc<dyn DifficultyRater>>,
    state: Mutex<ControllerSnapshot>,
}

impl AdaptiveController {
    /// Create a controller starting at `performance = 0`, `Normal`.
    pub fn new(policy: Arc<dyn SimplificationPolicy>, rewriter: Arc<dyn TextRewriter>) -> Self {
        Self {
            policy,
            rewriter,
            rater: None,
            state: Mutex::new(ControllerSnapshot::default()),
        }
    }

    /// Attach a difficulty rater. Without one every chunk is unrated.
    pub fn with_rater(mut self, rater: Arc<dyn DifficultyRater>) -> Self {
        self.rater = Some(rater);
        self
    }

    /// Resume from persisted state.
    ///
    /// Fails if the stored level is not a member of the policy's scale.
    pub fn restore(self, snapshot: ControllerSnapshot) -> Result<Self, CoreError> {
        let level = snapshot.state.level();
        if !self.policy.scale().contains(level) {
            return Err(CoreError::UnknownLevel(level.percent()));
        }
        Ok(Self {
            state: Mutex::new(snapshot),
            ..self
        })
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        *self.state.lock().await
    }

    /// Rate a chunk's difficulty, degrading failures to "unrated".
    pub async fn assess(&self, chunk: &Chunk) -> Option<DifficultyScore> {
        let rater = self.rater.as_ref()?;
        match rater.rate_difficulty(&chunk.text).await {
            Ok(score) => {
                if score.is_none() {
                    debug!(chunk = chunk.index, "rater returned no score");
                }
                score
            }
            Err(e) => {
                warn!(chunk = chunk.index, "difficulty rating failed, treating as unrated: {e:#}");
                None
            }
        }
    }

    /// Fold a rating without making a decision.
    ///
    /// Used when the rated chunk was the last one in the session.
    pub async fn fold_rating(&self, rating: Rating) -> f64 {
        let mut state = self.state.lock().await;
        state.performance.fold(rating.into())
    }

    /// Deliver a session's opening chunk unmodified.
    ///
    /// No rating exists yet, so no decision is taken and the state is left
    /// untouched.
    pub async fn open_chunk(&self, chunk: &Chunk, difficulty: Option<DifficultyScore>) -> AdaptedChunk {
        let performance = self.state.lock().await.performance.running_mean();
        info!(chunk = chunk.index, "opening chunk delivered unmodified");
        AdaptedChunk {
            index: chunk.index,
            text: chunk.text.clone(),
            level: SimplificationLevel::ZERO,
            delivery: Delivery::Original,
            difficulty,
            performance,
        }
    }

    /// Rate, decide and render the next chunk.
    pub async fn process_next_chunk(&self, chunk: &Chunk, rating: Option<Rating>) -> AdaptedChunk {
        let difficulty = self.assess(chunk).await;
        self.adapt(chunk, rating, difficulty).await
    }

    /// Decide and render the next chunk from an already-known difficulty.
    pub async fn adapt(
        &self,
        chunk: &Chunk,
        rating: Option<Rating>,
        difficulty: Option<DifficultyScore>,
    ) -> AdaptedChunk {
        let (performance, decision) = {
            let mut state = self.state.lock().await;
            if let Some(rating) = rating {
                state.performance.fold(rating.into());
            }
            let performance = state.performance.running_mean();
            let decision = self.policy.decide(&DecisionInput {
                previous: state.state,
                performance,
                rated: rating.is_some(),
                difficulty,
            });
            if decision != state.state {
                debug!(
                    policy = self.policy.name(),
                    from = %state.state.level(),
                    to = %decision.level(),
                    performance,
                    "decision state changed"
                );
            }
            state.state = decision;
            (performance, decision)
        };

        let level = decision.level();
        let (text, delivery) = self.render(chunk, level).await;

        info!(
            chunk = chunk.index,
            level = %level,
            performance,
            difficulty = ?difficulty.map(DifficultyScore::value),
            delivery = ?delivery,
            "chunk adapted"
        );

        AdaptedChunk {
            index: chunk.index,
            text,
            level,
            delivery,
            difficulty,
            performance,
        }
    }

    async fn render(&self, chunk: &Chunk, level: SimplificationLevel) -> (String, Delivery) {
        if level.is_zero() {
            return (chunk.text.clone(), Delivery::Original);
        }

        match self.rewriter.rewrite_chunk(&chunk.text, level).await {
            Ok(text) if !text.trim().is_empty() => (text, Delivery::Rewritten),
            Ok(_) => {
                warn!(chunk = chunk.index, "rewriter returned empty text, delivering original");
                (chunk.text.clone(), Delivery::Fallback)
            }
            Err(e) => {
                warn!(chunk = chunk.index, "rewrite failed, delivering original: {e:#}");
                (chunk.text.clone(), Delivery::Fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::level::LevelScale;
    use crate::policy::{DifficultyRelative, FixedLevelBucketed};

    /// Prefixes text with the requested level, or fails on demand.
    struct TagRewriter {
        calls: AtomicU32,
        fail: bool,
    }

    impl TagRewriter {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl TextRewriter for TagRewriter {
        async fn rewrite_chunk(
            &self,
            text: &str,
            level: SimplificationLevel,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                anyhow::bail!("rewriter unavailable");
            }
            Ok(format!("[{level}] {text}"))
        }
    }

    struct FixedRater(Option<f64>);

    #[async_trait]
    impl DifficultyRater for FixedRater {
        async fn rate_difficulty(&self, _text: &str) -> anyhow::Result<Option<DifficultyScore>> {
            Ok(self.0.and_then(DifficultyScore::new))
        }
    }

    struct BrokenRater;

    #[async_trait]
    impl DifficultyRater for BrokenRater {
        async fn rate_difficulty(&self, _text: &str) -> anyhow::Result<Option<DifficultyScore>> {
            anyhow::bail!("connection refused")
        }
    }

    fn bucketed() -> Arc<dyn SimplificationPolicy> {
        Arc::new(FixedLevelBucketed::new(LevelScale::default()).unwrap())
    }

    fn relative() -> Arc<dyn SimplificationPolicy> {
        Arc::new(DifficultyRelative::new(LevelScale::default()).unwrap())
    }

    fn chunk(index: usize) -> Chunk {
        Chunk::from_text(index, format!("Chunk number {index} about resistor networks."))
    }

    #[tokio::test]
    async fn zero_level_is_byte_identical_and_skips_rewriter() {
        let rewriter = TagRewriter::ok();
        let controller = AdaptiveController::new(bucketed(), rewriter.clone());
        let source = chunk(0);

        let adapted = controller.process_next_chunk(&source, None).await;
        assert_eq!(adapted.text, source.text);
        assert_eq!(adapted.delivery, Delivery::Original);
        assert_eq!(rewriter.calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn negative_first_rating_forces_smallest_level() {
        let controller = AdaptiveController::new(bucketed(), TagRewriter::ok());

        let adapted = controller
            .process_next_chunk(&chunk(1), Some(Rating::new(-150)))
            .await;
        assert_eq!(adapted.performance, -150.0);
        assert_eq!(adapted.level.percent(), 10);
        assert_eq!(adapted.delivery, Delivery::Rewritten);
        assert!(adapted.text.starts_with("[10%]"));
    }

    #[tokio::test]
    async fn rewriter_failure_delivers_original() {
        let controller = AdaptiveController::new(bucketed(), TagRewriter::failing());
        let source = chunk(1);

        let adapted = controller
            .process_next_chunk(&source, Some(Rating::new(-80)))
            .await;
        assert_eq!(adapted.text, source.text);
        assert_eq!(adapted.delivery, Delivery::Fallback);
        // The decision stands even though rendering fell back.
        assert_eq!(adapted.level.percent(), 10);
        assert!(controller.snapshot().await.state.is_simplifying());
    }

    #[tokio::test]
    async fn sticky_level_without_new_rating() {
        let controller = AdaptiveController::new(bucketed(), TagRewriter::ok());
        let first = controller
            .process_next_chunk(&chunk(1), Some(Rating::new(-120)))
            .await;
        let second = controller.process_next_chunk(&chunk(2), None).await;
        assert_eq!(first.level, second.level);
        assert_eq!(second.delivery, Delivery::Rewritten);
    }

    #[tokio::test]
    async fn rater_failure_is_unrated() {
        let controller =
            AdaptiveController::new(relative(), TagRewriter::ok()).with_rater(Arc::new(BrokenRater));
        let adapted = controller
            .process_next_chunk(&chunk(1), Some(Rating::new(-200)))
            .await;
        assert!(adapted.difficulty.is_none());
        assert_eq!(adapted.delivery, Delivery::Original);
    }

    #[tokio::test]
    async fn relative_policy_uses_rated_difficulty() {
        let controller = AdaptiveController::new(relative(), TagRewriter::ok())
            .with_rater(Arc::new(FixedRater(Some(1000.0))));
        let adapted = controller
            .process_next_chunk(&chunk(1), Some(Rating::new(-200)))
            .await;
        assert_eq!(adapted.difficulty.unwrap().value(), 1000.0);
        assert_eq!(adapted.level.percent(), 20);
    }

    #[tokio::test]
    async fn relative_policy_without_rating_service_never_simplifies() {
        let controller =
            AdaptiveController::new(relative(), TagRewriter::ok()).with_rater(Arc::new(FixedRater(None)));
        let adapted = controller
            .process_next_chunk(&chunk(1), Some(Rating::new(-200)))
            .await;
        assert_eq!(adapted.delivery, Delivery::Original);
        assert!(adapted.level.is_zero());
    }

    #[tokio::test]
    async fn opening_chunk_is_never_rewritten() {
        let rewriter = TagRewriter::ok();
        let controller = AdaptiveController::new(relative(), rewriter.clone());
        let source = chunk(0);
        let difficulty = DifficultyScore::new(1200.0);

        let adapted = controller.open_chunk(&source, difficulty).await;
        assert_eq!(adapted.text, source.text);
        assert_eq!(adapted.delivery, Delivery::Original);
        assert_eq!(adapted.difficulty, difficulty);
        assert_eq!(rewriter.calls.load(Ordering::Relaxed), 0);
        assert_eq!(controller.snapshot().await, ControllerSnapshot::default());
    }

    #[tokio::test]
    async fn restore_validates_level() {
        let scale = LevelScale::default();
        let snapshot = ControllerSnapshot {
            performance: PerformanceState::new(),
            state: DecisionState::Simplifying(scale.level(70).unwrap()),
        };
        let controller = AdaptiveController::new(bucketed(), TagRewriter::ok())
            .restore(snapshot)
            .unwrap();
        assert_eq!(controller.snapshot().await, snapshot);

        let narrow: Arc<dyn SimplificationPolicy> = Arc::new(
            FixedLevelBucketed::new(LevelScale {
                step_pct: 10,
                max_pct: 50,
                max_step_pct: 20,
            })
            .unwrap(),
        );
        let err = AdaptiveController::new(narrow, TagRewriter::ok())
            .restore(snapshot)
            .err()
            .unwrap();
        assert_eq!(err, CoreError::UnknownLevel(70));
    }

    #[tokio::test]
    async fn concurrent_steps_do_not_lose_folds() {
        let controller = Arc::new(AdaptiveController::new(bucketed(), TagRewriter::ok()));
        let mut handles = Vec::new();
        for i in 0..16 {
            let controller = Arc::clone(&controller);
            handles.push(tokio::spawn(async move {
                controller
                    .process_next_chunk(&chunk(i), Some(Rating::new(10 * i as i64)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.performance.sample_count(), 16);
        assert!((snapshot.performance.running_mean() - 75.0).abs() < 1e-9);
    }
}
