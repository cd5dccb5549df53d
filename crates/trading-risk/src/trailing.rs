//! Trailing rules for live positions.
//!
//! Both rules are pure: they take the current levels and return the level
//! to request, or `None` to leave the position alone.

use trading_core::types::Direction;

/// Stop-loss candidate accepted only when it tightens the current stop.
///
/// An unset stop accepts any finite candidate. A stop never moves against
/// the position.
pub fn trail_stop(direction: Direction, current: Option<f64>, candidate: f64) -> Option<f64> {
    if !candidate.is_finite() {
        return None;
    }
    match current {
        None => Some(candidate),
        Some(stop) if direction.is_beyond(candidate, stop) => Some(candidate),
        Some(_) => None,
    }
}

/// The next ladder target and the price that unlocks it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderStep {
    /// Price that must be reached before advancing
    pub trigger: f64,
    /// Take-profit to move to
    pub target: f64,
}

/// Next step up the ladder from `current_tp`.
///
/// `rungs` is ordered away from the reference with the entry rung first.
/// The target is the first rung strictly beyond the current take-profit; its
/// trigger is the rung before it, or the entry rung for the first target.
pub fn next_ladder_step(direction: Direction, rungs: &[f64], current_tp: Option<f64>) -> Option<LadderStep> {
    let (&entry, targets) = rungs.split_first()?;
    let index = match current_tp {
        None => 0,
        Some(tp) => targets.iter().position(|&r| direction.is_beyond(r, tp))?,
    };
    let target = *targets.get(index)?;
    let trigger = match index {
        0 => entry,
        i => targets[i - 1],
    };
    Some(LadderStep { trigger, target })
}

/// Take-profit to request once `price` has reached the next trigger.
///
/// Advances at most one rung per call.
pub fn ladder_advance(direction: Direction, rungs: &[f64], current_tp: Option<f64>, price: f64) -> Option<f64> {
    let step = next_ladder_step(direction, rungs, current_tp)?;
    direction.has_reached(price, step.trigger).then_some(step.target)
}
