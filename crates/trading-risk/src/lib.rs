//! Exit policy.
//!
//! Initial protective levels for new positions and the pure trailing rules
//! the exit controller applies every tick.

mod levels;
mod trailing;

pub use levels::{
    AtrZones, ExitConfig, InitialLevels, LevelInputs, StopLossPolicy, TakeProfitPolicy,
    VolatilityZone, ZoneMultipliers,
};
pub use trailing::{ladder_advance, next_ladder_step, trail_stop, LadderStep};
