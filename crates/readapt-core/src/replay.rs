//! Driving many sessions from scripted answers.
//!
//! Sessions share no state, so independent transcripts run concurrently under
//! a bounded number of permits. Steps inside one session stay strictly
//! sequential.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::error::CoreError;
use crate::session::{AnswerOutcome, ReadingSession, SessionSummary};

/// A session plus the answers a learner gives at each step.
pub struct Transcript {
    pub session: ReadingSession,
    pub answers: Vec<Vec<String>>,
}

/// Start `session` and submit each answer set in order.
///
/// Stops early when the session finishes; unused answer sets are ignored.
pub async fn replay(
    session: &mut ReadingSession,
    answers: impl IntoIterator<Item = Vec<String>>,
) -> Result<Vec<AnswerOutcome>, CoreError> {
    session.start().await?;
    let mut outcomes = Vec::new();
    for answer_set in answers {
        if session.is_finished() {
            break;
        }
        outcomes.push(session.submit_answers(answer_set).await?);
    }
    Ok(outcomes)
}

/// Replay transcripts concurrently, at most `parallelism` at a time.
///
/// Results are returned in input order.
pub async fn replay_all(
    transcripts: Vec<Transcript>,
    parallelism: usize,
) -> Vec<Result<SessionSummary, CoreError>> {
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut futures = FuturesUnordered::new();

    for (position, transcript) in transcripts.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        futures.push(async move {
            let Transcript {
                mut session,
                answers,
            } = transcript;
            let _permit = semaphore.acquire_owned().await;
            let result = match replay(&mut session, answers).await {
                Ok(_) => Ok(session.summary().await),
                Err(e) => {
                    tracing::error!(session = %session.id(), "replay failed: {e}");
                    Err(e)
                }
            };
            (position, result)
        });
    }

    let mut results = Vec::with_capacity(futures.len());
    while let Some(entry) = futures.next().await {
        results.push(entry);
    }
    results.sort_by_key(|(position, _)| *position);
    results.into_iter().map(|(_, result)| result).collect()
}
