//! Pluggable simplification policies and the decision state they drive.
//!
//! Two mutually exclusive policies are provided:
//!
//! - [`DifficultyRelative`] compares the learner's performance against the
//!   rated difficulty of the upcoming chunk and derives a strength from the gap.
//! - [`FixedLevelBucketed`] ignores difficulty and walks the level set with the
//!   bucketed [`select_next_level`] rule.
//!
//! A policy is chosen once per session and never changes mid-session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::level::{LevelScale, SimplificationLevel};
use crate::model::DifficultyScore;
use crate::selector::select_next_level;

/// Rendering state of the decision engine.
///
/// `Simplifying` always carries a nonzero level; use [`DecisionState::at`] to
/// construct from an arbitrary level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "level", rename_all = "snake_case")]
pub enum DecisionState {
    #[default]
    Normal,
    Simplifying(SimplificationLevel),
}

impl DecisionState {
    pub fn at(level: SimplificationLevel) -> Self {
        if level.is_zero() {
            DecisionState::Normal
        } else {
            DecisionState::Simplifying(level)
        }
    }

    /// The level chunks are rendered at in this state.
    pub fn level(&self) -> SimplificationLevel {
        match self {
            DecisionState::Normal => SimplificationLevel::ZERO,
            DecisionState::Simplifying(level) => *level,
        }
    }

    pub fn is_simplifying(&self) -> bool {
        matches!(self, DecisionState::Simplifying(_))
    }
}

/// Everything a policy may look at when deciding the next state.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput {
    /// State used for the previous chunk.
    pub previous: DecisionState,
    /// Running mean after folding this step's rating (if any).
    pub performance: f64,
    /// Whether a rating was folded this step.
    pub rated: bool,
    /// Rated difficulty of the upcoming chunk.
    pub difficulty: Option<DifficultyScore>,
}

/// Strategy deciding how strongly to rewrite the next chunk.
pub trait SimplificationPolicy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// The level set this policy selects from.
    fn scale(&self) -> &LevelScale;

    /// Compute the state for the upcoming chunk.
    fn decide(&self, input: &DecisionInput) -> DecisionState;
}

// ---------------------------------------------------------------------------
// Difficulty-relative policy
// ---------------------------------------------------------------------------

/// Simplify when performance falls below the chunk's rated difficulty.
///
/// The strength grows with the relative gap `(difficulty - performance) /
/// difficulty` along a three-segment curve capped at 75%, then snaps onto
/// the level set. The level moves toward that target by at most
/// `max_step_pct` per transition. Once simplifying, the level is kept while
/// the learner copes (sticky). An unrated chunk resets to `Normal`, the one
/// transition not bound by the step limit.
#[derive(Debug, Clone)]
pub struct DifficultyRelative {
    scale: LevelScale,
}

impl DifficultyRelative {
    pub fn new(scale: LevelScale) -> Result<Self, CoreError> {
        scale.validate()?;
        Ok(Self { scale })
    }
}

/// Map a relative difficulty gap onto a strength in `[0.1, 0.75]`.
pub fn gap_factor(difficulty: f64, performance: f64) -> f64 {
    let raw = (difficulty - performance) / difficulty;
    let factor = if raw < 0.3 {
        raw * 0.5
    } else if raw < 0.6 {
        0.15 + (raw - 0.3) * 0.6
    } else {
        0.33 + (raw - 0.6) * 0.7
    };
    factor.clamp(0.1, 0.75)
}

impl SimplificationPolicy for DifficultyRelative {
    fn name(&self) -> &'static str {
        "difficulty_relative"
    }

    fn scale(&self) -> &LevelScale {
        &self.scale
    }

    fn decide(&self, input: &DecisionInput) -> DecisionState {
        // A zero difficulty cannot anchor a relative gap; treat it as unrated.
        let Some(difficulty) = input.difficulty.filter(|d| d.value() > 0.0) else {
            return DecisionState::Normal;
        };

        if input.performance < difficulty.value() {
            let factor = gap_factor(difficulty.value(), input.performance);
            let target = self.scale.snap_nonzero(factor);
            return DecisionState::at(self.scale.step_toward(input.previous.level(), target));
        }

        input.previous
    }
}

// ---------------------------------------------------------------------------
// Fixed-level bucketed policy
// ---------------------------------------------------------------------------

/// Walk the level set by performance bucket, one bounded step per rating.
///
/// Difficulty is not consulted. When a step carries no new rating the previous
/// state is kept unchanged.
#[derive(Debug, Clone)]
pub struct FixedLevelBucketed {
    scale: LevelScale,
}

impl FixedLevelBucketed {
    pub fn new(scale: LevelScale) -> Result<Self, CoreError> {
        scale.validate()?;
        Ok(Self { scale })
    }
}

impl SimplificationPolicy for FixedLevelBucketed {
    fn name(&self) -> &'static str {
        "fixed_level_bucketed"
    }

    fn scale(&self) -> &LevelScale {
        &self.scale
    }

    fn decide(&self, input: &DecisionInput) -> DecisionState {
        if !input.rated {
            return input.previous;
        }
        DecisionState::at(select_next_level(
            &self.scale,
            input.previous.level(),
            input.performance,
        ))
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which policy a session runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    DifficultyRelative,
    #[default]
    FixedLevelBucketed,
}

/// Policy selection plus its level scale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub kind: PolicyKind,
    #[serde(flatten)]
    pub scale: LevelScale,
}

impl PolicyConfig {
    /// Instantiate the configured policy.
    pub fn build(&self) -> Result<Arc<dyn SimplificationPolicy>, CoreError> {
        Ok(match self.kind {
            PolicyKind::DifficultyRelative => Arc::new(DifficultyRelative::new(self.scale)?),
            PolicyKind::FixedLevelBucketed => Arc::new(FixedLevelBucketed::new(self.scale)?),
        })
    }
}
