//! End-to-end session tests with in-memory collaborators.
//!
//! These drive the public API the way a host application would: chunk a
//! text, deliver chunks, submit answers, and read the summary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use readapt_core::controller::{AdaptiveController, ControllerSnapshot, Delivery};
use readapt_core::error::CoreError;
use readapt_core::level::LevelScale;
use readapt_core::model::{Chunk, DifficultyScore, Rating};
use readapt_core::performance::PerformanceState;
use readapt_core::policy::{
    DecisionState, FixedLevelBucketed, PolicyConfig, PolicyKind, SimplificationPolicy,
};
use readapt_core::replay::{replay, replay_all, Transcript};
use readapt_core::session::{Collaborators, ReadingSession, FALLBACK_QUESTION};
use readapt_core::traits::{
    ChunkSource, DifficultyRater, Grade, GradeRequest, QuestionGenerator, ResponseGrader,
    TextRewriter,
};

const TEXT: &str = "Ohm's law relates voltage and current. \
                    Resistors in series add up. \
                    Resistors in parallel combine reciprocally. \
                    Voltage dividers split a supply.";

/// Splits on ". " so each sentence is a chunk.
struct SentenceChunker;

#[async_trait]
impl ChunkSource for SentenceChunker {
    async fn chunk_text(&self, text: &str) -> anyhow::Result<Vec<Chunk>> {
        Ok(text
            .split(". ")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, s)| Chunk::from_text(i, s))
            .collect())
    }
}

/// Looks up difficulty by chunk prefix.
struct TableRater(HashMap<&'static str, f64>);

#[async_trait]
impl DifficultyRater for TableRater {
    async fn rate_difficulty(&self, text: &str) -> anyhow::Result<Option<DifficultyScore>> {
        Ok(self
            .0
            .iter()
            .find(|(prefix, _)| text.starts_with(*prefix))
            .and_then(|(_, d)| DifficultyScore::new(*d)))
    }
}

/// Grades by the first answer, which must parse as the rating to give.
struct AnswerIsRating {
    calls: AtomicU32,
}

#[async_trait]
impl ResponseGrader for AnswerIsRating {
    async fn grade_responses(&self, request: &GradeRequest) -> anyhow::Result<Grade> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let rating = request
            .answers()
            .first()
            .and_then(|a| a.parse::<i64>().ok())
            .map(Rating::new);
        Ok(Grade {
            review: "Thanks for your answers.".into(),
            rating,
        })
    }
}

struct TwoQuestions;

#[async_trait]
impl QuestionGenerator for TwoQuestions {
    async fn generate_questions(&self, _text: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec!["What is stated?".into(), "Give an example.".into()])
    }
}

/// Records every rewrite request; can be switched into a failing mode.
#[derive(Default)]
struct RecordingRewriter {
    requests: Mutex<Vec<u8>>,
    fail: bool,
    empty: bool,
}

#[async_trait]
impl TextRewriter for RecordingRewriter {
    async fn rewrite_chunk(
        &self,
        text: &str,
        level: readapt_core::level::SimplificationLevel,
    ) -> anyhow::Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push(level.percent());
        if self.fail {
            anyhow::bail!("HTTP 500 from rewriter");
        }
        if self.empty {
            return Ok("   ".into());
        }
        Ok(format!("simple({}): {}", level.percent(), text))
    }
}

fn rater() -> Arc<TableRater> {
    Arc::new(TableRater(HashMap::from([
        ("Ohm's", 400.0),
        ("Resistors in series", 600.0),
        ("Resistors in parallel", 1200.0),
        ("Voltage dividers", 900.0),
    ])))
}

fn collaborators(rewriter: Arc<RecordingRewriter>, grader: Arc<AnswerIsRating>) -> Collaborators {
    Collaborators {
        chunker: Arc::new(SentenceChunker),
        rater: rater(),
        grader,
        rewriter,
        questions: Arc::new(TwoQuestions),
    }
}

fn grader() -> Arc<AnswerIsRating> {
    Arc::new(AnswerIsRating {
        calls: AtomicU32::new(0),
    })
}

fn answer(rating: i64) -> Vec<String> {
    vec![rating.to_string(), "something".into()]
}

fn bucketed() -> Arc<dyn SimplificationPolicy> {
    PolicyConfig::default().build().unwrap()
}

#[tokio::test]
async fn struggling_reader_from_zero_gets_smallest_level() {
    let rewriter = Arc::new(RecordingRewriter::default());
    let collab = collaborators(Arc::clone(&rewriter), grader());
    let mut session = ReadingSession::open(TEXT, &collab, bucketed()).await.unwrap();

    let first = session.start().await.unwrap();
    assert_eq!(first.chunk.text, "Ohm's law relates voltage and current");
    assert_eq!(first.chunk.delivery, Delivery::Original);

    let outcome = session.submit_answers(answer(-150)).await.unwrap();
    let next = outcome.next.unwrap();
    assert_eq!(next.chunk.performance, -150.0);
    assert_eq!(next.chunk.level.percent(), 10);
    assert_eq!(next.chunk.delivery, Delivery::Rewritten);
    assert_eq!(*rewriter.requests.lock().unwrap(), vec![10]);
}

#[tokio::test]
async fn strong_reader_walks_down_within_step_bound() {
    let scale = LevelScale::default();
    let policy: Arc<dyn SimplificationPolicy> = Arc::new(FixedLevelBucketed::new(scale).unwrap());
    let controller = AdaptiveController::new(policy, Arc::new(RecordingRewriter::default()))
        .restore(ControllerSnapshot {
            performance: PerformanceState::new(),
            state: DecisionState::Simplifying(scale.max_level()),
        })
        .unwrap();

    let mut previous = scale.max_level();
    let mut levels = Vec::new();
    for i in 0..3 {
        let chunk = Chunk::from_text(i, "A passage.");
        let adapted = controller.adapt(&chunk, Some(Rating::new(200)), None).await;
        assert!(scale.within_step(previous, adapted.level));
        previous = adapted.level;
        levels.push(adapted.level.percent());
    }

    assert_eq!(levels, vec![50, 30, 10]);
    assert_eq!(controller.snapshot().await.performance.running_mean(), 200.0);
}

#[tokio::test]
async fn rewriter_failures_deliver_original_text() {
    for rewriter in [
        RecordingRewriter {
            fail: true,
            ..Default::default()
        },
        RecordingRewriter {
            empty: true,
            ..Default::default()
        },
    ] {
        let rewriter = Arc::new(rewriter);
        let collab = collaborators(Arc::clone(&rewriter), grader());
        let mut session = ReadingSession::open(TEXT, &collab, bucketed()).await.unwrap();
        session.start().await.unwrap();

        let next = session
            .submit_answers(answer(-120))
            .await
            .unwrap()
            .next
            .unwrap();
        assert_eq!(next.chunk.text, "Resistors in series add up");
        assert_eq!(next.chunk.delivery, Delivery::Fallback);
        assert_eq!(rewriter.requests.lock().unwrap().len(), 1);

        let summary = session.summary().await;
        assert_eq!(summary.rewrite_fallbacks, 1);
        assert_eq!(summary.chunks_rewritten, 0);
    }
}

#[tokio::test]
async fn mismatched_answers_never_reach_the_grader() {
    let grader = grader();
    let collab = collaborators(Arc::new(RecordingRewriter::default()), Arc::clone(&grader));
    let mut session = ReadingSession::open(TEXT, &collab, bucketed()).await.unwrap();
    session.start().await.unwrap();

    let err = session
        .submit_answers(vec!["x".into()])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::MismatchedAnswers {
            questions: 2,
            answers: 1
        }
    );
    assert_eq!(grader.calls.load(Ordering::Relaxed), 0);
    assert_eq!(session.summary().await.performance.sample_count(), 0);
}

#[tokio::test]
async fn difficulty_relative_session() {
    let rewriter = Arc::new(RecordingRewriter::default());
    let collab = collaborators(Arc::clone(&rewriter), grader());
    let policy = PolicyConfig {
        kind: PolicyKind::DifficultyRelative,
        scale: LevelScale::default(),
    }
    .build()
    .unwrap();
    let mut session = ReadingSession::open(TEXT, &collab, policy).await.unwrap();

    let first = session.start().await.unwrap();
    assert_eq!(first.chunk.difficulty.unwrap().value(), 400.0);
    assert_eq!(first.chunk.delivery, Delivery::Original);

    // performance 100 vs difficulty 600: gap 0.833 -> 0.49 -> 50%, one step of 20.
    let second = session.submit_answers(answer(100)).await.unwrap().next.unwrap();
    assert_eq!(second.chunk.difficulty.unwrap().value(), 600.0);
    assert_eq!(second.chunk.level.percent(), 20);

    // performance 150 vs difficulty 1200: gap 0.875 -> 0.5225 -> 50%, next step.
    let third = session.submit_answers(answer(200)).await.unwrap().next.unwrap();
    assert_eq!(third.chunk.level.percent(), 40);
    assert_eq!(third.chunk.delivery, Delivery::Rewritten);
}

#[tokio::test]
async fn full_session_summary() {
    let collab = collaborators(Arc::new(RecordingRewriter::default()), grader());
    let mut session = ReadingSession::open(TEXT, &collab, bucketed()).await.unwrap();

    let outcomes = replay(
        &mut session,
        vec![answer(-150), answer(-150), answer(50), answer(120), answer(0)],
    )
    .await
    .unwrap();
    // Four chunks means four gradings; the fifth answer set is unused.
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.last().unwrap().next.is_none());
    assert!(session.is_finished());
    assert_eq!(
        session.submit_answers(answer(0)).await.err(),
        Some(CoreError::SessionFinished)
    );

    let summary = session.summary().await;
    assert!(summary.finished);
    assert_eq!(summary.chunks_total, 4);
    assert_eq!(summary.history.len(), 4);
    assert_eq!(summary.performance.sample_count(), 4);
    assert!((summary.performance.running_mean() - (-32.5)).abs() < 1e-9);
    assert_ne!(summary.elo.rating, 1000.0);
    let levels: Vec<u8> = summary.history.iter().map(|r| r.level.percent()).collect();
    assert_eq!(levels, vec![0, 10, 30, 50]);
}

#[tokio::test]
async fn unrated_answers_are_excluded_from_performance() {
    let collab = collaborators(Arc::new(RecordingRewriter::default()), grader());
    let mut session = ReadingSession::open(TEXT, &collab, bucketed()).await.unwrap();
    session.start().await.unwrap();

    session.submit_answers(answer(-60)).await.unwrap();
    let outcome = session
        .submit_answers(vec!["no idea".into(), "none".into()])
        .await
        .unwrap();
    assert!(outcome.review.rating.is_none());
    assert!(!outcome.review.degraded);

    let summary = session.summary().await;
    assert_eq!(summary.performance.sample_count(), 1);
    assert_eq!(summary.performance.running_mean(), -60.0);
}

#[tokio::test]
async fn sessions_fan_out_independently() {
    let mut transcripts = Vec::new();
    for rating in [-150i64, 0, 150] {
        let collab = collaborators(Arc::new(RecordingRewriter::default()), grader());
        let session = ReadingSession::open(TEXT, &collab, bucketed()).await.unwrap();
        transcripts.push(Transcript {
            session,
            answers: vec![answer(rating); 4],
        });
    }

    let results = replay_all(transcripts, 2).await;
    let means: Vec<f64> = results
        .into_iter()
        .map(|r| r.unwrap().performance.running_mean())
        .collect();
    assert_eq!(means, vec![-150.0, 0.0, 150.0]);
}

#[tokio::test]
async fn question_failure_uses_generic_question() {
    struct BrokenQuestions;

    #[async_trait]
    impl QuestionGenerator for BrokenQuestions {
        async fn generate_questions(&self, _text: &str) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("timeout")
        }
    }

    let mut collab = collaborators(Arc::new(RecordingRewriter::default()), grader());
    collab.questions = Arc::new(BrokenQuestions);
    let mut session = ReadingSession::open(TEXT, &collab, bucketed()).await.unwrap();

    let first = session.start().await.unwrap();
    assert_eq!(first.questions, vec![FALLBACK_QUESTION.to_string()]);
    let outcome = session.submit_answers(vec!["80".into()]).await.unwrap();
    assert_eq!(outcome.review.rating, Some(Rating::new(80)));
}
