//! Robot arm joint helpers
//!
//! Names the first five servo channels as arm joints and moves them as
//! independent servos (no group claim).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use kinema_hal::ServoPwm;

use crate::controller::MotionController;
use crate::motion::ServoMask;
use crate::state::Notify;

/// Number of arm joints
pub const JOINT_COUNT: usize = 5;

/// Arm joint, mapped to the servo channel of the same index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ArmJoint {
    /// Base rotation
    Base = 0,
    /// Shoulder pitch
    Shoulder = 1,
    /// Elbow pitch
    Elbow = 2,
    /// Wrist pitch
    Wrist = 3,
    /// Wrist roll
    WristRotate = 4,
}

impl ArmJoint {
    /// All joints in channel order
    pub const ALL: [ArmJoint; JOINT_COUNT] = [
        ArmJoint::Base,
        ArmJoint::Shoulder,
        ArmJoint::Elbow,
        ArmJoint::Wrist,
        ArmJoint::WristRotate,
    ];

    /// Servo channel driving this joint
    pub const fn servo(self) -> u8 {
        self as u8
    }

    /// Joint on a servo channel
    pub fn from_servo(servo: u8) -> Option<Self> {
        Self::ALL.get(servo as usize).copied()
    }
}

/// One angle per joint, in [`ArmJoint::ALL`] order
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArmPose {
    /// Joint angles in degrees
    pub angles: [f32; JOINT_COUNT],
}

impl ArmPose {
    /// Pose from joint angles
    pub const fn new(angles: [f32; JOINT_COUNT]) -> Self {
        Self { angles }
    }

    /// Angle of one joint
    pub fn angle(&self, joint: ArmJoint) -> f32 {
        self.angles[joint as usize]
    }
}

/// Servo mask covering every arm joint
pub fn arm_mask() -> ServoMask {
    let mut mask = ServoMask::EMPTY;
    for joint in ArmJoint::ALL {
        mask.insert(joint.servo());
    }
    mask
}

impl<P: ServoPwm> MotionController<P> {
    /// Send every joint to its calibrated home angle
    ///
    /// Returns the joints that started moving.
    pub fn arm_home(&mut self, duration: u32) -> ServoMask {
        let mut moved = ServoMask::EMPTY;
        for joint in ArmJoint::ALL {
            if let Ok(true) = self.move_home(joint.servo(), duration, Notify::Silent) {
                moved.insert(joint.servo());
            }
        }
        moved
    }

    /// Move every joint to the pose's angle over one duration
    ///
    /// Joints held by a group are skipped. Returns the joints that started
    /// moving.
    pub fn arm_set_pose(&mut self, pose: &ArmPose, duration: u32) -> ServoMask {
        let mut moves = [(0u8, 0.0f32); JOINT_COUNT];
        for (slot, joint) in moves.iter_mut().zip(ArmJoint::ALL) {
            *slot = (joint.servo(), pose.angle(joint));
        }
        self.move_angle_many(&moves, duration, Notify::Silent)
    }

    /// Joint angle
    pub fn arm_joint_angle(&self, joint: ArmJoint) -> f32 {
        self.current_angle(joint.servo())
    }

    /// Arm joints currently moving
    pub fn arm_moving_mask(&self) -> ServoMask {
        self.moving_mask().intersection(arm_mask())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_SERVOS;
    use crate::state::EventLog;
    use kinema_hal::MockPwm;

    #[test]
    fn test_joint_mapping() {
        assert_eq!(ArmJoint::Base.servo(), 0);
        assert_eq!(ArmJoint::WristRotate.servo(), 4);
        assert_eq!(ArmJoint::from_servo(2), Some(ArmJoint::Elbow));
        assert_eq!(ArmJoint::from_servo(5), None);
        assert_eq!(arm_mask().bits(), 0b11111);
    }

    #[test]
    fn test_set_pose_and_home() {
        let mut c = MotionController::new(MockPwm::<MAX_SERVOS>::new());
        let mut log: EventLog<8> = EventLog::new();

        let pose = ArmPose::new([0.0, 90.0, 135.0, 180.0, 270.0]);
        // Elbow already at 135°
        let moved = c.arm_set_pose(&pose, 50);
        assert_eq!(moved, ServoMask::from_ids(&[0, 1, 3, 4]));
        assert_eq!(c.arm_moving_mask(), moved);

        for _ in 0..50 {
            c.tick(&mut log);
        }
        assert_eq!(c.arm_moving_mask(), ServoMask::EMPTY);
        assert!((c.arm_joint_angle(ArmJoint::Wrist) - 180.0).abs() < 0.2);
        assert_eq!(c.current_pulse(ArmJoint::WristRotate.servo()), 2500);

        let moved = c.arm_home(50);
        assert_eq!(moved, ServoMask::from_ids(&[0, 1, 3, 4]));
        for _ in 0..50 {
            c.tick(&mut log);
        }
        for joint in ArmJoint::ALL {
            assert_eq!(c.current_pulse(joint.servo()), 1500);
        }
        assert!(log.is_empty());
    }

    #[test]
    fn test_set_pose_skips_grouped_joint() {
        let mut c = MotionController::new(MockPwm::<MAX_SERVOS>::new());
        c.start_group(&[ArmJoint::Shoulder.servo()], Notify::Silent).unwrap();

        let moved = c.arm_set_pose(&ArmPose::new([10.0; JOINT_COUNT]), 20);
        assert!(!moved.contains(ArmJoint::Shoulder.servo()));
        assert_eq!(moved.count(), 4);
    }
}
