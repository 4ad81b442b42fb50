//! Motion error types

use core::fmt;

/// Errors reported by motion operations
///
/// Every failure is recovered locally; nothing in the motion core aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionError {
    /// Servo index outside the configured servo count
    InvalidServo,
    /// Servo is claimed by an active synchronization group
    ServoBusy,
    /// No free group or cycle slot
    NoFreeSlot,
    /// Rejected configuration (empty lists, capacity exceeded, mixed modes)
    InvalidConfig,
    /// Cycle index out of range or slot not allocated
    InvalidCycle,
    /// Operation not valid in the current cycle phase
    InvalidState,
    /// Group id not active
    UnknownGroup,
    /// Id and value slices differ in length
    LengthMismatch,
    /// Calibration record could not be encoded or decoded
    Serialization,
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MotionError::InvalidServo => "invalid servo index",
            MotionError::ServoBusy => "servo claimed by another group",
            MotionError::NoFreeSlot => "no free slot",
            MotionError::InvalidConfig => "invalid configuration",
            MotionError::InvalidCycle => "invalid cycle index",
            MotionError::InvalidState => "operation not valid in current state",
            MotionError::UnknownGroup => "unknown group",
            MotionError::LengthMismatch => "id and value counts differ",
            MotionError::Serialization => "calibration record encoding failed",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for MotionError {}
