//! Trading engine.
//!
//! One control loop drives three controllers against a shared
//! [`EngineContext`]:
//! - [`ReconciliationEngine`]: adopts manual positions and finalizes closed ones
//! - [`ExitController`]: trails stops along the volatility band and targets
//!   along the price ladder
//! - [`EntryController`]: trend-signal entries and reversals

mod context;
mod control;
mod entry;
mod exits;
mod reconcile;
mod schedule;

#[cfg(test)]
mod testing;

pub use context::EngineContext;
pub use control::{ControlLoop, TickOutcome};
pub use entry::{EntryAction, EntryConfig, EntryController};
pub use exits::{ExitController, ExitReport};
pub use reconcile::{ReconcileConfig, ReconcileReport, ReconciliationEngine};
pub use schedule::ScheduleConfig;
