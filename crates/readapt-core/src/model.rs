//! Core data model types for readapt.
//!
//! Chunks, ratings and difficulty scores flow between the collaborators and
//! the controller. All numeric types clamp on construction so that every
//! value stored by the control loop is within its declared bounds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lowest rating a grader may assign.
pub const RATING_MIN: i32 = -200;
/// Highest rating a grader may assign.
pub const RATING_MAX: i32 = 200;

/// Lower bound of the lexile-like difficulty scale.
pub const DIFFICULTY_MIN: f64 = 0.0;
/// Upper bound of the lexile-like difficulty scale.
pub const DIFFICULTY_MAX: f64 = 2000.0;

/// Comprehension rating for one chunk's question/answer exchange.
///
/// Always within `[RATING_MIN, RATING_MAX]`. Positive means the learner
/// understood the text, negative means misunderstanding, zero is neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct Rating(i32);

impl Rating {
    /// Create a rating, clamping into the declared range.
    pub fn new(value: i64) -> Self {
        Self(value.clamp(RATING_MIN as i64, RATING_MAX as i64) as i32)
    }

    /// Create a rating from a possibly fractional grader output.
    ///
    /// Fractions are truncated toward zero. Returns `None` for NaN or infinite
    /// input; those are unparseable, not zero.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Some(Self::new(value.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64))
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Rating {
    fn from(value: i32) -> Self {
        Self::new(value as i64)
    }
}

impl From<Rating> for i32 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl From<Rating> for f64 {
    fn from(rating: Rating) -> Self {
        rating.0 as f64
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally estimated reading difficulty of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DifficultyScore(f64);

impl DifficultyScore {
    /// Create a score, clamping into the scale. Non-finite input is unrated.
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Some(Self(value.clamp(DIFFICULTY_MIN, DIFFICULTY_MAX)))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for DifficultyScore {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("difficulty must be finite, got {value}"))
    }
}

impl From<DifficultyScore> for f64 {
    fn from(score: DifficultyScore) -> Self {
        score.0
    }
}

impl fmt::Display for DifficultyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}", self.0)
    }
}

/// One sentence inside a semantic chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    pub start_index: usize,
    pub end_index: usize,
    pub token_count: usize,
}

/// An immutable span of source text presented to the learner as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk within the session (0-based).
    pub index: usize,
    /// Chunk text.
    pub text: String,
    /// Character offset of the chunk start in the source text.
    pub start_index: usize,
    /// Character offset of the chunk end in the source text.
    pub end_index: usize,
    /// Token count reported by the chunker.
    pub token_count: usize,
    /// Sentences making up the chunk, when the chunker reports them.
    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

impl Chunk {
    /// Build a chunk from bare text, estimating tokens by whitespace.
    pub fn from_text(index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let token_count = text.split_whitespace().count();
        let end_index = text.chars().count();
        Self {
            index,
            text,
            start_index: 0,
            end_index,
            token_count,
            sentences: Vec::new(),
        }
    }
}
