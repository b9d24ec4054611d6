//! Level selection: maps a performance signal onto the discrete level set.
//!
//! Performance is bucketed into a signed adjustment relative to the current
//! level. The raw target is clamped to the scale, then snapped to the nearest
//! member reachable within one step. A struggling learner (negative
//! performance) never drops back to the zero level.

use crate::level::{LevelScale, SimplificationLevel};

/// Signed adjustment, in percentage points, for a performance value.
///
/// | performance    | adjustment |
/// |----------------|------------|
/// | > 100          | -20        |
/// | (0, 100]       | -10        |
/// | (-50, 0]       | +10        |
/// | (-100, -50]    | +20        |
/// | <= -100        | +30        |
pub fn bucket_adjustment_pct(performance: f64) -> i16 {
    if performance > 100.0 {
        -20
    } else if performance > 0.0 {
        -10
    } else if performance > -50.0 {
        10
    } else if performance > -100.0 {
        20
    } else {
        30
    }
}

/// Choose the next level from the current level and the latest performance.
///
/// The result is always a member of `scale` and within `scale.max_step_pct`
/// of `current`.
pub fn select_next_level(
    scale: &LevelScale,
    current: SimplificationLevel,
    performance: f64,
) -> SimplificationLevel {
    let struggling = performance < 0.0;
    if struggling && current.is_zero() {
        return scale.smallest_nonzero();
    }

    let current_pct = i16::from(current.percent());
    let target = (current_pct + bucket_adjustment_pct(performance)).clamp(0, i16::from(scale.max_pct));

    let reachable: Vec<SimplificationLevel> = scale
        .levels()
        .filter(|&level| scale.within_step(current, level))
        .collect();
    let candidates = if struggling && reachable.iter().any(|l| !l.is_zero()) {
        reachable.into_iter().filter(|l| !l.is_zero()).collect()
    } else {
        reachable
    };

    // Ties go to the level closest to `current`.
    candidates
        .into_iter()
        .min_by_key(|level| {
            let pct = i16::from(level.percent());
            ((pct - target).abs(), (pct - current_pct).abs())
        })
        .unwrap_or(current)
}
