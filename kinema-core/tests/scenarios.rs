use kinema_core::arm::{ArmJoint, ArmPose};
use kinema_core::config::{CalibrationData, ServoProfile, MAX_CYCLES, MAX_EVENTS_PER_TICK, MAX_SERVOS};
use kinema_core::motion::ServoMask;
use kinema_core::scheduler::{CycleConfig, Pose};
use kinema_core::state::{CycleStatusUpdate, EventLog, MotionEvent, Notify};
use kinema_core::{MotionController, MotionError, SharedMotion};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use kinema_hal::MockPwm;

type Controller = MotionController<MockPwm<MAX_SERVOS>>;

fn controller() -> Controller {
    MotionController::new(MockPwm::new())
}

fn statuses(log: &EventLog<64>) -> Vec<CycleStatusUpdate> {
    log.iter()
        .filter_map(|e| match e {
            MotionEvent::CycleStatus(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[test]
fn two_servos_finish_together() {
    let mut c = controller();
    let mut log: EventLog<64> = EventLog::new();
    assert_eq!(c.current_pulse(0), 1500);
    assert_eq!(c.current_pulse(1), 1500);

    let group = c
        .group_move_pulse(&[0, 1], &[1800, 1200], 100, Notify::Emit)
        .unwrap();
    for _ in 0..100 {
        c.tick(&mut log);
    }

    assert_eq!(c.current_pulse(0), 1800);
    assert_eq!(c.current_pulse(1), 1200);
    assert_eq!(c.pwm().pulse(0), Some(1800));
    assert_eq!(c.pwm().pulse(1), Some(1200));
    assert_eq!(log.events(), &[MotionEvent::GroupComplete { group }]);
    assert_eq!(c.busy_mask(), ServoMask::EMPTY);
}

#[test]
fn release_mid_motion_frees_servos_immediately() {
    let mut c = controller();
    let mut log: EventLog<64> = EventLog::new();
    let group = c
        .group_move_pulse(&[0, 1, 2], &[2500, 500, 2000], 200, Notify::Emit)
        .unwrap();
    for _ in 0..80 {
        c.tick(&mut log);
    }

    c.release_group(group, &mut log).unwrap();
    for servo in 0..3 {
        assert!(!c.is_moving(servo));
        assert!(c.is_servo_available(servo));
    }

    // Same tick: a new group may claim them
    let next = c
        .group_move_pulse(&[0, 1, 2], &[1500, 1500, 1500], 10, Notify::Emit)
        .unwrap();
    for _ in 0..10 {
        c.tick(&mut log);
    }
    assert_eq!(log.events(), &[MotionEvent::GroupComplete { group: next }]);
}

#[test]
fn three_pose_two_loop_cycle_reports_in_order() {
    let mut c = controller();
    let mut log: EventLog<64> = EventLog::new();
    let config = CycleConfig::new(&[0, 1], 2)
        .unwrap()
        .with_pose(Pose::pulses(&[1000, 2000], 50).unwrap())
        .unwrap()
        .with_pose(Pose::pulses(&[2000, 1000], 50).unwrap())
        .unwrap()
        .with_pose(Pose::pulses(&[1500, 1500], 50).unwrap())
        .unwrap();
    let index = c.create_cycle(config, Notify::Emit).unwrap();
    c.set_cycle_user_data(index, Some(0x42)).unwrap();
    c.start_cycle(index, &mut log).unwrap();

    for _ in 0..300 {
        c.tick(&mut log);
    }

    let reports = statuses(&log);
    let poses: Vec<(u32, u8, bool)> = reports
        .iter()
        .map(|s| (s.loop_count, s.pose_index, s.finished))
        .collect();
    assert_eq!(
        poses,
        vec![
            (0, 0, false), // start
            (0, 0, false), // pose 0 playing
            (0, 1, false),
            (0, 2, false),
            (1, 0, false), // loop boundary
            (1, 1, false),
            (1, 2, false),
            (2, 0, false), // loop boundary
            (2, 0, true),  // finished
        ]
    );
    assert!(reports.iter().all(|s| s.cycle == index && s.max_loops == 2));

    let status = c.cycle_status(index).unwrap();
    assert!(!status.running);
    assert_eq!(status.user_data, Some(0x42));
    assert_eq!(c.busy_mask(), ServoMask::EMPTY);
}

#[test]
fn cycle_restart_after_finish() {
    let mut c = controller();
    let mut log: EventLog<64> = EventLog::new();
    let config = CycleConfig::new(&[2], 1)
        .unwrap()
        .with_pose(Pose::angles(&[45.0], 5).unwrap())
        .unwrap();
    let index = c.create_cycle(config, Notify::Emit).unwrap();
    c.start_cycle(index, &mut log).unwrap();
    for _ in 0..5 {
        c.tick(&mut log);
    }
    assert!(!c.cycle_status(index).unwrap().running);

    // A finished cycle is idle and may be restarted
    c.restart_cycle(index, &mut log).unwrap();
    assert!(c.cycle_status(index).unwrap().running);
    c.pause_cycle(index, &mut log).unwrap();
    assert_eq!(c.pause_cycle(index, &mut log), Err(MotionError::InvalidState));
    c.release_cycle(index, &mut log).unwrap();
    assert_eq!(c.cycle_status(index), Err(MotionError::InvalidCycle));
    assert_eq!(c.busy_mask(), ServoMask::EMPTY);
}

#[test]
fn cycles_on_disjoint_servos_run_side_by_side() {
    let mut c = controller();
    let mut log: EventLog<64> = EventLog::new();
    let a = CycleConfig::new(&[0, 1], 0)
        .unwrap()
        .with_pose(Pose::pulses(&[1000, 1000], 10).unwrap())
        .unwrap()
        .with_pose(Pose::pulses(&[2000, 2000], 10).unwrap())
        .unwrap();
    let b = CycleConfig::new(&[2, 3], 3)
        .unwrap()
        .with_pose(Pose::angles(&[0.0, 270.0], 7).unwrap())
        .unwrap();

    let a = c.create_cycle(a, Notify::Silent).unwrap();
    let b = c.create_cycle(b, Notify::Silent).unwrap();
    c.start_cycle(a, &mut log).unwrap();
    c.start_cycle(b, &mut log).unwrap();
    assert_eq!(c.busy_mask(), ServoMask::from_ids(&[0, 1, 2, 3]));

    for _ in 0..100 {
        c.tick(&mut log);
    }
    assert_eq!(c.cycle_status(a).unwrap().loop_count, 5);
    let b_status = c.cycle_status(b).unwrap();
    assert!(!b_status.running);
    assert_eq!(b_status.loop_count, 3);
    assert_eq!(c.busy_mask(), ServoMask::from_ids(&[0, 1]));
}

#[test]
fn cycle_conflicting_with_external_group_fails_to_start() {
    let mut c = controller();
    let mut log: EventLog<64> = EventLog::new();
    c.group_move_pulse(&[1], &[2000], 100, Notify::Silent).unwrap();

    let config = CycleConfig::new(&[0, 1], 0)
        .unwrap()
        .with_pose(Pose::pulses(&[1000, 1000], 10).unwrap())
        .unwrap();
    let index = c.create_cycle(config, Notify::Emit).unwrap();
    assert_eq!(c.start_cycle(index, &mut log), Err(MotionError::ServoBusy));
    assert!(statuses(&log).last().unwrap().finished);
    assert!(!c.is_moving(0));
}

#[test]
fn calibration_survives_persistence() {
    let mut c = controller();
    c.configure(ArmJoint::Elbow.servo(), ServoProfile::new(700, 2300, 0.0, 180.0))
        .unwrap();

    let mut record = c.calibration();
    let mut buf = [0u8; kinema_core::config::CALIBRATION_MAX_ENCODED];
    let len = record.encode(&mut buf).unwrap().len();

    let mut restored = controller();
    restored
        .apply_calibration(&CalibrationData::decode(&buf[..len]).unwrap())
        .unwrap();
    assert_eq!(restored.profile(2), c.profile(2));
    assert_eq!(restored.angle_to_pulse(2, 90.0), 1500);
}

#[test]
fn arm_pose_through_shared_controller() {
    let shared: SharedMotion<NoopRawMutex, MockPwm<MAX_SERVOS>> = SharedMotion::new(controller());
    shared.lock(|m| m.sync_to_hardware());

    let pose = ArmPose::new([90.0, 45.0, 180.0, 200.0, 10.0]);
    let moved = shared.lock(|m| m.arm_set_pose(&pose, 40));
    assert_eq!(moved.count(), 5);

    for _ in 0..40 {
        let events = shared.tick::<8>();
        assert!(events.is_empty());
    }
    shared.with(|m| {
        assert_eq!(m.arm_moving_mask(), ServoMask::EMPTY);
        for joint in ArmJoint::ALL {
            assert!((m.arm_joint_angle(joint) - pose.angle(joint)).abs() < 0.2);
        }
    });

    shared.lock(|m| m.emergency_stop(&mut |_: MotionEvent| {}));
    assert_eq!(shared.with(|m| m.pwm().pulse(4)), Some(1500));
}

#[test]
fn busiest_tick_fits_event_buffer() {
    let shared: SharedMotion<NoopRawMutex, MockPwm<MAX_SERVOS>> = SharedMotion::new(controller());

    shared.lock(|m| {
        let mut sink = |_: MotionEvent| {};
        for servo in 0..MAX_CYCLES as u8 {
            let config = CycleConfig::new(&[servo], 1)
                .unwrap()
                .with_pose(Pose::pulses(&[1000 + 100 * servo as u16], 10).unwrap())
                .unwrap();
            let cycle = m.create_cycle(config, Notify::Emit).unwrap();
            m.start_cycle(cycle, &mut sink).unwrap();
        }
        m.group_move_pulse(&[5], &[2000], 10, Notify::Emit).unwrap();
    });

    let mut finished = 0;
    let mut groups = 0;
    for _ in 0..10 {
        let events = shared.tick::<MAX_EVENTS_PER_TICK>();
        assert_eq!(events.dropped(), 0);
        finished += events.iter().filter(|e| e.is_cycle_finished()).count();
        groups += events.iter().filter(|e| e.is_group_complete()).count();
    }
    assert_eq!(finished, MAX_CYCLES);
    assert_eq!(groups, 1);
}
