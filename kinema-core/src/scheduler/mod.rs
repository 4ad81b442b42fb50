//! Cyclic pose scheduler
//!
//! Plays a fixed pose sequence through repeated synchronization groups for
//! a bounded or unbounded number of loops.

pub mod cycle;
pub mod executor;

pub use cycle::{CycleConfig, CycleMode, CycleStatus, Pose, PoseValues};
pub use executor::CycleScheduler;
