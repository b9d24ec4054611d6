//! Core error types.
//!
//! These cover caller precondition violations and invalid configuration.
//! Collaborator failures are not represented here: the control loop degrades
//! them to safe defaults instead of surfacing them.

use thiserror::Error;

/// Errors raised by the adaptive control loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A grading request paired a different number of answers with the questions.
    #[error("questions and answers must be the same length (got {questions} questions, {answers} answers)")]
    MismatchedAnswers { questions: usize, answers: usize },

    /// The level scale configuration cannot produce a valid level set.
    #[error("invalid level scale: {0}")]
    InvalidScale(String),

    /// A restored or requested level is not a member of the configured scale.
    #[error("level {0}% is not a member of the configured scale")]
    UnknownLevel(u8),

    /// The source text produced no chunks.
    #[error("no chunks to read")]
    EmptyText,

    /// Answers were submitted before the session delivered its first chunk.
    #[error("session has not delivered a chunk yet")]
    SessionNotStarted,

    /// `start` was called on a session that already delivered a chunk.
    #[error("session already started")]
    SessionAlreadyStarted,

    /// Answers were submitted after the last chunk was graded.
    #[error("session is finished")]
    SessionFinished,
}

impl CoreError {
    /// Returns `true` if the error is a caller bug rather than a state issue.
    pub fn is_precondition(&self) -> bool {
        matches!(self, CoreError::MismatchedAnswers { .. })
    }
}
