//! Learner reading ELO, updated against chunk difficulty.
//!
//! Chunk difficulty sits on the same 0–2000 lexile-like scale as the ELO
//! rating, so each graded chunk acts as an opponent. The learner's rating
//! (clamped to [-200, 200]) is mapped to an actual score in [0, 1].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{DifficultyScore, RATING_MAX, RATING_MIN};

/// Starting ELO for a new learner.
pub const DEFAULT_ELO: f64 = 1000.0;

/// The rating never drops below this floor.
pub const MIN_ELO: f64 = 100.0;

/// Expected score of a reader rated `rating_a` against text rated `rating_b`.
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((rating_b - rating_a) / 400.0))
}

/// Map a comprehension rating onto an actual score in `[0, 1]`.
pub fn normalize_performance(performance: f64) -> f64 {
    let clamped = performance.clamp(RATING_MIN as f64, RATING_MAX as f64);
    (clamped - RATING_MIN as f64) / (RATING_MAX - RATING_MIN) as f64
}

/// Base K-factor by rating band: newer (lower rated) readers move faster.
pub fn k_factor(elo: f64) -> f64 {
    if elo < 1200.0 {
        32.0
    } else if elo < 1800.0 {
        24.0
    } else {
        16.0
    }
}

/// Multiplier on K for readers with few graded chunks.
pub fn session_k_adjustment(completed_chunks: u32) -> f64 {
    match completed_chunks {
        0..=4 => 1.5,
        5..=14 => 1.2,
        15..=29 => 1.1,
        _ => 1.0,
    }
}

/// Rounded ELO change for one graded chunk.
pub fn elo_change(elo: f64, difficulty: f64, performance: f64, k: f64) -> f64 {
    let expected = expected_score(elo, difficulty);
    let actual = normalize_performance(performance);
    (k * (actual - expected)).round()
}

/// Descriptive reading level for an ELO value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingLevel {
    Beginning,
    Developing,
    Proficient,
    Skilled,
    Advanced,
    Expert,
    Master,
}

impl ReadingLevel {
    pub fn from_elo(elo: f64) -> Self {
        match elo {
            e if e < 800.0 => ReadingLevel::Beginning,
            e if e < 1000.0 => ReadingLevel::Developing,
            e if e < 1200.0 => ReadingLevel::Proficient,
            e if e < 1400.0 => ReadingLevel::Skilled,
            e if e < 1600.0 => ReadingLevel::Advanced,
            e if e < 1800.0 => ReadingLevel::Expert,
            _ => ReadingLevel::Master,
        }
    }
}

impl fmt::Display for ReadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReadingLevel::Beginning => "Beginning Reader",
            ReadingLevel::Developing => "Developing Reader",
            ReadingLevel::Proficient => "Proficient Reader",
            ReadingLevel::Skilled => "Skilled Reader",
            ReadingLevel::Advanced => "Advanced Reader",
            ReadingLevel::Expert => "Expert Reader",
            ReadingLevel::Master => "Master Reader",
        };
        f.write_str(label)
    }
}

/// A learner's reading ELO and how many chunks contributed to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingElo {
    pub rating: f64,
    pub updates: u32,
}

impl Default for ReadingElo {
    fn default() -> Self {
        Self {
            rating: DEFAULT_ELO,
            updates: 0,
        }
    }
}

impl ReadingElo {
    /// Apply one graded chunk and return the change actually applied.
    pub fn update(&mut self, difficulty: DifficultyScore, performance: f64) -> f64 {
        let k = k_factor(self.rating) * session_k_adjustment(self.updates);
        let change = elo_change(self.rating, difficulty.value(), performance, k);
        let previous = self.rating;
        self.rating = (previous + change).max(MIN_ELO);
        self.updates += 1;
        self.rating - previous
    }

    pub fn level(&self) -> ReadingLevel {
        ReadingLevel::from_elo(self.rating)
    }
}
