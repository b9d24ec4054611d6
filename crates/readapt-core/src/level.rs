//! Discrete simplification levels.
//!
//! Levels are stored as whole percentages so that set membership is exact.
//! A [`LevelScale`] defines the ordered set (`0, step, 2*step, ..., max`) and
//! the largest change allowed in one transition.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// No scale may move more than this many percentage points per transition.
pub const MAX_STEP_LIMIT_PCT: u8 = 20;

/// Rewrite strength applied to a chunk, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimplificationLevel(u8);

impl SimplificationLevel {
    /// The zero-simplification level: text is delivered unmodified.
    pub const ZERO: SimplificationLevel = SimplificationLevel(0);

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Strength as a fraction in `[0, 1]`.
    pub fn factor(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    fn distance(self, other: SimplificationLevel) -> u8 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for SimplificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// The fixed ordered set of simplification levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelScale {
    /// Distance between adjacent levels in percentage points.
    #[serde(default = "default_step_pct")]
    pub step_pct: u8,
    /// Highest level in the set.
    #[serde(default = "default_max_pct")]
    pub max_pct: u8,
    /// Largest change allowed per transition.
    #[serde(default = "default_max_step_pct")]
    pub max_step_pct: u8,
}

fn default_step_pct() -> u8 {
    10
}
fn default_max_pct() -> u8 {
    70
}
fn default_max_step_pct() -> u8 {
    20
}

impl Default for LevelScale {
    fn default() -> Self {
        Self {
            step_pct: default_step_pct(),
            max_pct: default_max_pct(),
            max_step_pct: default_max_step_pct(),
        }
    }
}

impl LevelScale {
    /// Check that the scale describes a usable level set.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.step_pct == 0 {
            return Err(CoreError::InvalidScale("step_pct must be positive".into()));
        }
        if self.max_pct == 0 || self.max_pct > 100 {
            return Err(CoreError::InvalidScale(format!(
                "max_pct must be in 1..=100, got {}",
                self.max_pct
            )));
        }
        if self.max_pct % self.step_pct != 0 {
            return Err(CoreError::InvalidScale(format!(
                "max_pct {} is not a multiple of step_pct {}",
                self.max_pct, self.step_pct
            )));
        }
        if self.max_step_pct < self.step_pct || self.max_step_pct > MAX_STEP_LIMIT_PCT {
            return Err(CoreError::InvalidScale(format!(
                "max_step_pct must be in {}..={MAX_STEP_LIMIT_PCT}, got {}",
                self.step_pct, self.max_step_pct
            )));
        }
        Ok(())
    }

    /// All members of the set in ascending order.
    pub fn levels(&self) -> impl Iterator<Item = SimplificationLevel> + '_ {
        (0..=self.max_pct)
            .step_by(self.step_pct.max(1) as usize)
            .map(SimplificationLevel)
    }

    pub fn contains(&self, level: SimplificationLevel) -> bool {
        self.step_pct > 0 && level.0 <= self.max_pct && level.0 % self.step_pct == 0
    }

    /// Look up a member by percentage.
    pub fn level(&self, percent: u8) -> Result<SimplificationLevel, CoreError> {
        let level = SimplificationLevel(percent);
        if self.contains(level) {
            Ok(level)
        } else {
            Err(CoreError::UnknownLevel(percent))
        }
    }

    pub fn smallest_nonzero(&self) -> SimplificationLevel {
        SimplificationLevel(self.step_pct.min(self.max_pct))
    }

    pub fn max_level(&self) -> SimplificationLevel {
        SimplificationLevel(self.max_pct)
    }

    /// Whether moving from `from` to `to` respects the per-transition bound.
    pub fn within_step(&self, from: SimplificationLevel, to: SimplificationLevel) -> bool {
        from.distance(to) <= self.max_step_pct
    }

    /// Move from `from` toward `target`, at most `max_step_pct` in one go.
    ///
    /// The stride is rounded down to a multiple of `step_pct` so the result
    /// stays a member when both endpoints are.
    pub fn step_toward(
        &self,
        from: SimplificationLevel,
        target: SimplificationLevel,
    ) -> SimplificationLevel {
        let step = self.step_pct.max(1);
        let stride = (self.max_step_pct - self.max_step_pct % step).max(step);
        let percent = if target.0 >= from.0 {
            target.0.min(from.0.saturating_add(stride))
        } else {
            target.0.max(from.0.saturating_sub(stride))
        };
        SimplificationLevel(percent)
    }

    /// Snap a fractional strength onto the nearest nonzero member.
    ///
    /// Used when a policy computes a continuous factor; the result is never
    /// the zero level.
    pub fn snap_nonzero(&self, factor: f64) -> SimplificationLevel {
        let percent = if factor.is_finite() { factor * 100.0 } else { 0.0 };
        let steps = (percent / f64::from(self.step_pct.max(1))).round();
        let max_steps = f64::from(self.max_pct / self.step_pct.max(1));
        let steps = steps.clamp(1.0, max_steps.max(1.0)) as u8;
        SimplificationLevel(steps * self.step_pct).min(self.max_level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scale_has_eight_levels() {
        let scale = LevelScale::default();
        let percents: Vec<u8> = scale.levels().map(|l| l.percent()).collect();
        assert_eq!(percents, vec![0, 10, 20, 30, 40, 50, 60, 70]);
        assert!(scale.validate().is_ok());
    }

    #[test]
    fn membership() {
        let scale = LevelScale::default();
        assert!(scale.level(30).is_ok());
        assert_eq!(scale.level(35), Err(CoreError::UnknownLevel(35)));
        assert_eq!(scale.level(80), Err(CoreError::UnknownLevel(80)));
    }

    #[test]
    fn rejects_bad_scales() {
        let zero_step = LevelScale {
            step_pct: 0,
            ..Default::default()
        };
        assert!(zero_step.validate().is_err());

        let ragged = LevelScale {
            step_pct: 15,
            max_pct: 70,
            max_step_pct: 15,
        };
        assert!(ragged.validate().is_err());

        let huge_step = LevelScale {
            max_step_pct: 30,
            ..Default::default()
        };
        assert!(huge_step.validate().is_err());
    }

    #[test]
    fn snap_never_returns_zero() {
        let scale = LevelScale::default();
        assert_eq!(scale.snap_nonzero(0.0).percent(), 10);
        assert_eq!(scale.snap_nonzero(0.14).percent(), 10);
        assert_eq!(scale.snap_nonzero(0.26).percent(), 30);
        assert_eq!(scale.snap_nonzero(0.75).percent(), 70);
        assert_eq!(scale.snap_nonzero(f64::NAN).percent(), 10);
    }

    #[test]
    fn step_toward_is_bounded() {
        let scale = LevelScale::default();
        let l = |p| scale.level(p).unwrap();
        assert_eq!(scale.step_toward(l(0), l(70)), l(20));
        assert_eq!(scale.step_toward(l(60), l(10)), l(40));
        assert_eq!(scale.step_toward(l(30), l(40)), l(40));
        assert_eq!(scale.step_toward(l(30), l(30)), l(30));

        let odd = LevelScale {
            step_pct: 10,
            max_pct: 70,
            max_step_pct: 15,
        };
        assert_eq!(odd.step_toward(l(0), l(70)), l(10));
        for from in odd.levels() {
            for target in odd.levels() {
                let next = odd.step_toward(from, target);
                assert!(odd.contains(next));
                assert!(odd.within_step(from, next));
            }
        }
    }

    #[test]
    fn level_factor() {
        let scale = LevelScale::default();
        let level = scale.level(40).unwrap();
        assert!((level.factor() - 0.4).abs() < f64::EPSILON);
        assert_eq!(level.to_string(), "40%");
    }
}
