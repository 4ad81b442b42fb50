//! Arm demonstration routine
//!
//! Homes the arm as one synchronized group, waves through a pose cycle a
//! few times, then parks and repeats.

use defmt::*;
use embassy_time::Timer;

use kinema_core::arm::{ArmJoint, ArmPose, JOINT_COUNT};
use kinema_core::scheduler::{CycleConfig, Pose};
use kinema_core::state::Notify;
use kinema_core::sync::GroupId;
use kinema_core::MotionError;

use crate::channels::{publish, CYCLE_UPDATE, GROUP_DONE};
use crate::Motion;

/// Homing move duration in ticks
const HOME_TICKS: u32 = 1500;

/// Duration of each wave pose in ticks
const WAVE_POSE_TICKS: u32 = 800;

/// Wave repetitions per round
const WAVE_LOOPS: u32 = 3;

/// Pause between rounds in seconds
const ROUND_PAUSE_SECS: u64 = 5;

const WAVE: [ArmPose; 3] = [
    ArmPose::new([135.0, 100.0, 200.0, 135.0, 135.0]),
    ArmPose::new([90.0, 110.0, 190.0, 100.0, 60.0]),
    ArmPose::new([180.0, 110.0, 190.0, 170.0, 210.0]),
];

#[embassy_executor::task]
pub async fn demo_task(motion: &'static Motion) {
    info!("Demo task started");
    Timer::after_millis(500).await;

    loop {
        home(motion).await;

        if let Err(e) = wave(motion).await {
            warn!("Wave cycle failed: {}", e);
        }

        let parked = motion.lock(|m| m.arm_home(HOME_TICKS));
        debug!("Parking {} joints", parked.count());
        Timer::after_secs(ROUND_PAUSE_SECS).await;
    }
}

fn arm_servos() -> [u8; JOINT_COUNT] {
    ArmJoint::ALL.map(ArmJoint::servo)
}

/// Move every joint to its home angle as one group
async fn home(motion: &'static Motion) {
    let servos = arm_servos();
    let angles = motion.with(|m| ArmJoint::ALL.map(|joint| m.profile(joint.servo()).mid_angle));

    match motion.lock(|m| m.group_move_angle(&servos, &angles, HOME_TICKS, Notify::Emit)) {
        Ok(group) => {
            wait_group(group).await;
            info!("Arm homed");
        }
        Err(e) => warn!("Homing rejected: {}", e),
    }
}

async fn wait_group(group: GroupId) {
    while GROUP_DONE.wait().await != group {}
}

fn wave_cycle() -> Result<CycleConfig, MotionError> {
    let mut config = CycleConfig::new(&arm_servos(), WAVE_LOOPS)?;
    for pose in &WAVE {
        config.push_pose(Pose::angles(&pose.angles, WAVE_POSE_TICKS)?)?;
    }
    Ok(config)
}

/// Play the wave cycle to completion, then free its slot
async fn wave(motion: &'static Motion) -> Result<(), MotionError> {
    let config = wave_cycle()?;
    let cycle = motion.lock(|m| m.create_cycle(config, Notify::Emit))?;

    let started = motion.lock(|m| m.start_cycle(cycle, &mut publish));
    if started.is_ok() {
        loop {
            let update = CYCLE_UPDATE.wait().await;
            if update.cycle == cycle && update.finished {
                break;
            }
        }
    }

    motion.lock(|m| m.release_cycle(cycle, &mut publish))?;
    started
}
