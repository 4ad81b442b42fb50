//! Cycle configuration and status types
//!
//! Pose data is copied into fixed-capacity storage when a cycle is built,
//! so a created cycle owns everything it plays.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{MAX_POSES, MAX_SERVOS};
use crate::error::MotionError;
use crate::motion::ServoMask;
use crate::sync::GroupId;

/// Value domain of a cycle's poses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CycleMode {
    /// Pulse widths in µs
    Pulse,
    /// Angles in degrees
    Angle,
}

/// One value per cycle servo, tagged with its domain
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PoseValues {
    /// Pulse widths in µs
    Pulse(Vec<u16, MAX_SERVOS>),
    /// Angles in degrees
    Angle(Vec<f32, MAX_SERVOS>),
}

impl PoseValues {
    /// Domain of these values
    pub fn mode(&self) -> CycleMode {
        match self {
            PoseValues::Pulse(_) => CycleMode::Pulse,
            PoseValues::Angle(_) => CycleMode::Angle,
        }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        match self {
            PoseValues::Pulse(v) => v.len(),
            PoseValues::Angle(v) => v.len(),
        }
    }

    /// Check if there are no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Target values for every cycle servo plus the time to reach them
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Targets, in cycle servo order
    pub values: PoseValues,
    /// Move duration in ticks
    pub duration: u32,
}

impl Pose {
    /// Pulse-domain pose
    pub fn pulses(values: &[u16], duration: u32) -> Result<Self, MotionError> {
        let values = Vec::from_slice(values).map_err(|_| MotionError::InvalidConfig)?;
        Ok(Self {
            values: PoseValues::Pulse(values),
            duration,
        })
    }

    /// Angle-domain pose
    pub fn angles(values: &[f32], duration: u32) -> Result<Self, MotionError> {
        let values = Vec::from_slice(values).map_err(|_| MotionError::InvalidConfig)?;
        Ok(Self {
            values: PoseValues::Angle(values),
            duration,
        })
    }
}

/// Everything needed to create a cycle
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CycleConfig {
    /// Servos moved by every pose
    pub servo_ids: Vec<u8, MAX_SERVOS>,
    /// Poses in playing order
    pub poses: Vec<Pose, MAX_POSES>,
    /// Loop limit (0 = repeat until paused or released)
    pub max_loops: u32,
}

impl CycleConfig {
    /// Start a configuration with no poses
    pub fn new(servo_ids: &[u8], max_loops: u32) -> Result<Self, MotionError> {
        Ok(Self {
            servo_ids: Vec::from_slice(servo_ids).map_err(|_| MotionError::InvalidConfig)?,
            poses: Vec::new(),
            max_loops,
        })
    }

    /// Append a pose
    pub fn push_pose(&mut self, pose: Pose) -> Result<(), MotionError> {
        self.poses.push(pose).map_err(|_| MotionError::InvalidConfig)
    }

    /// Builder form of [`CycleConfig::push_pose`]
    pub fn with_pose(mut self, pose: Pose) -> Result<Self, MotionError> {
        self.push_pose(pose)?;
        Ok(self)
    }

    /// Domain of the first pose
    pub fn mode(&self) -> Option<CycleMode> {
        self.poses.first().map(|p| p.values.mode())
    }

    /// Number of poses
    pub fn pose_count(&self) -> u8 {
        self.poses.len() as u8
    }

    /// Mask of the cycle's servos
    pub fn servo_mask(&self) -> ServoMask {
        ServoMask::from_ids(&self.servo_ids)
    }

    /// Check the configuration can be played
    ///
    /// Requires at least one servo and one pose, in-range unique servo ids,
    /// one value per servo in every pose and a single value domain.
    pub fn validate(&self) -> Result<CycleMode, MotionError> {
        if self.servo_ids.is_empty() {
            return Err(MotionError::InvalidConfig);
        }
        if self.servo_ids.iter().any(|&id| id as usize >= MAX_SERVOS) {
            return Err(MotionError::InvalidServo);
        }
        if self.servo_mask().count() as usize != self.servo_ids.len() {
            return Err(MotionError::InvalidConfig);
        }

        let mode = self.mode().ok_or(MotionError::InvalidConfig)?;
        for pose in &self.poses {
            if pose.values.len() != self.servo_ids.len() {
                return Err(MotionError::LengthMismatch);
            }
            if pose.values.mode() != mode {
                return Err(MotionError::InvalidConfig);
            }
        }
        Ok(mode)
    }
}

/// Snapshot of an allocated cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CycleStatus {
    /// Slot allocated (always true for a returned status)
    pub active: bool,
    /// Advancing pose by pose
    pub running: bool,
    /// Pose being played
    pub pose_index: u8,
    /// Poses per loop
    pub pose_count: u8,
    /// Completed loops
    pub loop_count: u32,
    /// Loop limit (0 = unbounded)
    pub max_loops: u32,
    /// Group driving the current pose
    pub active_group: Option<GroupId>,
    /// Owner's handle
    pub user_data: Option<u32>,
}
