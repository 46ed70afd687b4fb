//! Periodic producer runs gated by a daily blocked window.

pub mod blocked_period;
pub mod runner;

pub use blocked_period::{BlockedPeriod, BlockedPeriodError};
pub use runner::{LoopState, Scheduler, SchedulerConfig, SchedulerExit};
