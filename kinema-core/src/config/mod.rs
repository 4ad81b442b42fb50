//! Configuration type definitions
//!
//! Compile-time capacities, per-servo calibration profiles and the
//! persisted calibration record.

pub mod calibration;
pub mod profile;

pub use calibration::*;
pub use profile::*;

/// Number of servo channels driven by the controller
pub const MAX_SERVOS: usize = 6;

/// Maximum concurrently active synchronization groups
pub const MAX_SYNC_GROUPS: usize = 8;

/// Maximum concurrently allocated pose cycles
pub const MAX_CYCLES: usize = 5;

/// Maximum poses per cycle
pub const MAX_POSES: usize = 8;

/// Tick period in milliseconds (one interpolation step per tick)
pub const TICK_PERIOD_MS: u32 = 1;

/// Upper bound on events a single tick can raise
///
/// Every servo completing, every external group completing and two status
/// reports per cycle (pose boundary, then finished).
pub const MAX_EVENTS_PER_TICK: usize = MAX_SERVOS + MAX_SYNC_GROUPS + 2 * MAX_CYCLES;
