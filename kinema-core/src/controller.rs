//! Motion controller
//!
//! Owns the PWM backend and the three motion layers, and performs the
//! synchronous completion chain:
//!
//! ```text
//! tick ─▶ ServoBank ─(finished servos)─▶ SyncManager ─(finished groups)─▶ owner
//!                                                          │
//!                                   External(Emit) ◀───────┴───────▶ CycleScheduler
//!                                   GroupComplete event                next pose
//! ```
//!
//! Every servo advanced by a tick is processed before any group completion
//! of that tick is routed, so moves started by the chain are first advanced
//! on the following tick.

use heapless::Vec;
use kinema_hal::ServoPwm;

use crate::config::{CalibrationData, ServoProfile, MAX_SERVOS, MAX_SYNC_GROUPS};
use crate::error::MotionError;
use crate::motion::{ServoBank, ServoMask};
use crate::scheduler::{CycleConfig, CycleScheduler, CycleStatus};
use crate::state::{MotionEvent, MotionObserver, Notify};
use crate::sync::{CompletedGroup, GroupId, GroupOwner, SyncManager};

/// Servo bank, groups and cycles behind one PWM backend
pub struct MotionController<P> {
    pwm: P,
    bank: ServoBank,
    sync: SyncManager,
    cycles: CycleScheduler,
}

impl<P: ServoPwm> MotionController<P> {
    /// Create a controller with default calibration
    ///
    /// Outputs are not driven until [`MotionController::sync_to_hardware`],
    /// so servos do not jump at power-on.
    pub fn new(pwm: P) -> Self {
        Self {
            pwm,
            bank: ServoBank::new(),
            sync: SyncManager::new(),
            cycles: CycleScheduler::new(),
        }
    }

    /// PWM backend
    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    /// Mutable PWM backend
    pub fn pwm_mut(&mut self) -> &mut P {
        &mut self.pwm
    }

    /// Servo trajectories
    pub fn bank(&self) -> &ServoBank {
        &self.bank
    }

    /// Group manager
    pub fn sync(&self) -> &SyncManager {
        &self.sync
    }

    /// Cycle scheduler
    pub fn cycles(&self) -> &CycleScheduler {
        &self.cycles
    }

    // ---- calibration -------------------------------------------------------

    /// Replace a servo's calibration (invalid bounds fall back to defaults)
    pub fn configure(&mut self, servo: u8, profile: ServoProfile) -> Result<(), MotionError> {
        if self.bank.configure(servo, profile) {
            Ok(())
        } else {
            Err(MotionError::InvalidServo)
        }
    }

    /// Calibration of a servo
    pub fn profile(&self, servo: u8) -> ServoProfile {
        self.bank.profile(servo)
    }

    /// Apply every profile of a calibration record
    pub fn apply_calibration(&mut self, data: &CalibrationData) -> Result<(), MotionError> {
        if !data.is_valid() {
            return Err(MotionError::InvalidConfig);
        }
        for (servo, profile) in data.profiles.iter().enumerate() {
            self.bank.configure(servo as u8, *profile);
        }
        info!("calibration applied");
        Ok(())
    }

    /// Current calibration as a record ready to persist
    pub fn calibration(&self) -> CalibrationData {
        let mut data = CalibrationData::new();
        for servo in 0..MAX_SERVOS as u8 {
            data.set(servo, self.bank.profile(servo));
        }
        data.update_crc();
        data
    }

    /// Convert an angle to a pulse using a servo's calibration
    pub fn angle_to_pulse(&self, servo: u8, angle: f32) -> u16 {
        self.bank.angle_to_pulse(servo, angle)
    }

    /// Convert a pulse to an angle using a servo's calibration
    pub fn pulse_to_angle(&self, servo: u8, pulse: u16) -> f32 {
        self.bank.pulse_to_angle(servo, pulse)
    }

    /// Write every servo's current pulse to the outputs
    pub fn sync_to_hardware(&mut self) {
        self.bank.sync_to_hardware(&mut self.pwm);
    }

    // ---- single servo ------------------------------------------------------

    fn check_unclaimed(&self, servo: u8) -> Result<(), MotionError> {
        if servo as usize >= MAX_SERVOS {
            return Err(MotionError::InvalidServo);
        }
        if self.sync.owner_of(servo).is_some() {
            return Err(MotionError::ServoBusy);
        }
        Ok(())
    }

    /// Move one servo to a pulse
    ///
    /// Servos held by a group are rejected. Returns `Ok(false)` if the servo
    /// is already there (no completion will follow).
    pub fn move_pulse(&mut self, servo: u8, pulse: u16, duration: u32, notify: Notify) -> Result<bool, MotionError> {
        self.check_unclaimed(servo)?;
        Ok(self.bank.begin_move(servo, pulse, duration, notify))
    }

    /// Move one servo to an angle
    pub fn move_angle(&mut self, servo: u8, angle: f32, duration: u32, notify: Notify) -> Result<bool, MotionError> {
        self.check_unclaimed(servo)?;
        Ok(self.bank.move_angle(servo, angle, duration, notify))
    }

    /// Move one servo by `delta` degrees
    pub fn move_relative(&mut self, servo: u8, delta: f32, duration: u32, notify: Notify) -> Result<bool, MotionError> {
        self.check_unclaimed(servo)?;
        Ok(self.bank.move_relative(servo, delta, duration, notify))
    }

    /// Move one servo to its calibrated home angle
    pub fn move_home(&mut self, servo: u8, duration: u32, notify: Notify) -> Result<bool, MotionError> {
        self.check_unclaimed(servo)?;
        Ok(self.bank.move_home(servo, duration, notify))
    }

    /// Independent pulse moves sharing one duration
    ///
    /// Each pair stands alone: out-of-range or group-held servos are skipped
    /// without affecting the rest. Returns the servos that were scheduled.
    pub fn move_pulse_many(&mut self, moves: &[(u8, u16)], duration: u32, notify: Notify) -> ServoMask {
        let mut scheduled = ServoMask::EMPTY;
        for &(servo, pulse) in moves {
            if let Ok(true) = self.move_pulse(servo, pulse, duration, notify) {
                scheduled.insert(servo);
            }
        }
        scheduled
    }

    /// Independent angle moves sharing one duration
    pub fn move_angle_many(&mut self, moves: &[(u8, f32)], duration: u32, notify: Notify) -> ServoMask {
        let mut scheduled = ServoMask::EMPTY;
        for &(servo, angle) in moves {
            if let Ok(true) = self.move_angle(servo, angle, duration, notify) {
                scheduled.insert(servo);
            }
        }
        scheduled
    }

    /// Stop one servo where it is
    ///
    /// Runs the normal completion path, including its group's bookkeeping.
    pub fn stop<O: MotionObserver>(&mut self, servo: u8, observer: &mut O) -> bool {
        if !self.bank.stop(servo, observer) {
            return false;
        }
        self.finish_servos(ServoMask::single(servo), observer);
        true
    }

    /// Stop every servo where it is, returning those that completed
    pub fn stop_all<O: MotionObserver>(&mut self, observer: &mut O) -> ServoMask {
        let stopped = self.bank.stop_all(observer);
        self.finish_servos(stopped, observer);
        stopped
    }

    /// Freeze one servo's trajectory
    pub fn pause(&mut self, servo: u8) -> bool {
        self.bank.pause(servo)
    }

    /// Continue one paused servo
    pub fn resume(&mut self, servo: u8) -> bool {
        self.bank.resume(servo)
    }

    /// Stop all cycles and groups and snap every servo to its home pulse
    ///
    /// Running cycles report themselves finished; groups and servos do not
    /// report completion.
    pub fn emergency_stop<O: MotionObserver>(&mut self, observer: &mut O) {
        warn!("emergency stop");
        self.cycles.stop_all(&mut self.bank, &mut self.sync, observer);
        let mut silent = |_: MotionEvent| {};
        self.sync.release_all(&mut self.bank, &mut silent);
        self.bank.emergency_stop(&mut self.pwm);
    }

    /// Emergency stop, then free every cycle and group slot
    pub fn reset<O: MotionObserver>(&mut self, observer: &mut O) {
        self.emergency_stop(observer);
        self.cycles.clear();
        self.sync.reset();
    }

    // ---- groups ------------------------------------------------------------

    /// Claim servos as a group without moving them
    ///
    /// The group only completes through [`MotionController::stop`] of its
    /// members or is cancelled with [`MotionController::release_group`].
    /// Servos still running or paused in a single move cannot be claimed.
    pub fn start_group(&mut self, servos: &[u8], notify: Notify) -> Result<GroupId, MotionError> {
        if servos
            .iter()
            .any(|&servo| self.bank.is_moving(servo) || self.bank.is_paused(servo))
        {
            return Err(MotionError::ServoBusy);
        }
        self.sync.start_group(servos, GroupOwner::External(notify))
    }

    /// Move several servos to pulses as one group
    pub fn group_move_pulse(
        &mut self,
        servos: &[u8],
        pulses: &[u16],
        duration: u32,
        notify: Notify,
    ) -> Result<GroupId, MotionError> {
        self.sync
            .move_pulse(&mut self.bank, servos, pulses, duration, GroupOwner::External(notify))
    }

    /// Move several servos to angles as one group
    pub fn group_move_angle(
        &mut self,
        servos: &[u8],
        angles: &[f32],
        duration: u32,
        notify: Notify,
    ) -> Result<GroupId, MotionError> {
        self.sync
            .move_angle(&mut self.bank, servos, angles, duration, GroupOwner::External(notify))
    }

    /// Cancel a group; members stop in place and are freed
    ///
    /// Releasing a cycle's pose group aborts that cycle, which reports
    /// itself finished if it was running.
    pub fn release_group<O: MotionObserver>(&mut self, group: GroupId, observer: &mut O) -> Result<(), MotionError> {
        let owner = self.sync.group(group).map(|g| g.owner);
        match owner {
            Some(GroupOwner::Cycle(cycle)) if self.cycles.owner_of(group) == Some(cycle) => {
                self.cycles.abort(cycle, &mut self.bank, &mut self.sync, observer)
            }
            _ => self.sync.release_group(&mut self.bank, group, observer),
        }
    }

    /// Freeze every member of a group
    pub fn pause_group(&mut self, group: GroupId) -> Result<(), MotionError> {
        self.sync.pause_group(&mut self.bank, group)
    }

    /// Resume every member of a paused group
    pub fn restart_group(&mut self, group: GroupId) -> Result<(), MotionError> {
        self.sync.restart_group(&mut self.bank, group)
    }

    /// True for finished, released and unknown groups
    pub fn is_group_complete(&self, group: GroupId) -> bool {
        self.sync.is_group_complete(group)
    }

    /// Servos claimed by a group
    pub fn group_mask(&self, group: GroupId) -> ServoMask {
        self.sync.group_mask(group)
    }

    /// Servos claimed by any group
    pub fn busy_mask(&self) -> ServoMask {
        self.sync.busy_mask()
    }

    /// Servos not claimed by any group
    pub fn idle_mask(&self) -> ServoMask {
        self.sync.idle_mask()
    }

    /// Number of claimed servos
    pub fn busy_count(&self) -> u32 {
        self.sync.busy_count()
    }

    /// Check if a servo is in range and unclaimed
    pub fn is_servo_available(&self, servo: u8) -> bool {
        self.sync.is_servo_available(servo)
    }

    // ---- cycles ------------------------------------------------------------

    /// Allocate an idle cycle
    pub fn create_cycle(&mut self, config: CycleConfig, notify: Notify) -> Result<u8, MotionError> {
        self.cycles.create(config, notify)
    }

    /// Start an idle cycle from pose 0
    pub fn start_cycle<O: MotionObserver>(&mut self, cycle: u8, observer: &mut O) -> Result<(), MotionError> {
        self.cycles.start(cycle, &mut self.bank, &mut self.sync, observer)
    }

    /// Restart a cycle from pose 0
    pub fn restart_cycle<O: MotionObserver>(&mut self, cycle: u8, observer: &mut O) -> Result<(), MotionError> {
        self.cycles.restart(cycle, &mut self.bank, &mut self.sync, observer)
    }

    /// Pause a running cycle
    pub fn pause_cycle<O: MotionObserver>(&mut self, cycle: u8, observer: &mut O) -> Result<(), MotionError> {
        self.cycles.pause(cycle, &mut self.bank, &mut self.sync, observer)
    }

    /// Free a cycle slot
    pub fn release_cycle<O: MotionObserver>(&mut self, cycle: u8, observer: &mut O) -> Result<(), MotionError> {
        self.cycles.release(cycle, &mut self.bank, &mut self.sync, observer)
    }

    /// Snapshot of an allocated cycle
    pub fn cycle_status(&self, cycle: u8) -> Result<CycleStatus, MotionError> {
        self.cycles.status(cycle)
    }

    /// Attach the owner's handle to a cycle
    pub fn set_cycle_user_data(&mut self, cycle: u8, value: Option<u32>) -> Result<(), MotionError> {
        self.cycles.set_user_data(cycle, value)
    }

    /// Owner's handle of a cycle
    pub fn cycle_user_data(&self, cycle: u8) -> Option<u32> {
        self.cycles.user_data(cycle)
    }

    /// Number of allocated cycles
    pub fn active_cycle_count(&self) -> usize {
        self.cycles.active_count()
    }

    // ---- tick --------------------------------------------------------------

    /// Advance everything by one tick
    pub fn tick<O: MotionObserver>(&mut self, observer: &mut O) {
        let finished = self.bank.tick(&mut self.pwm, observer);
        if !finished.is_empty() {
            self.finish_servos(finished, observer);
        }
    }

    /// Feed finished servos to the group manager, then route finished groups
    fn finish_servos<O: MotionObserver>(&mut self, finished: ServoMask, observer: &mut O) {
        let mut groups: Vec<CompletedGroup, MAX_SYNC_GROUPS> = Vec::new();
        for servo in finished.iter() {
            if let Some(done) = self.sync.on_servo_complete(servo) {
                let _ = groups.push(done);
            }
        }

        for done in groups {
            match done.owner {
                GroupOwner::External(notify) => {
                    if notify.is_emit() {
                        observer.on_event(MotionEvent::GroupComplete { group: done.id });
                    }
                }
                GroupOwner::Cycle(cycle) => {
                    self.cycles
                        .on_group_complete(cycle, done.id, &mut self.bank, &mut self.sync, observer);
                }
            }
        }
    }

    // ---- queries -----------------------------------------------------------

    /// Check if a servo is advancing
    pub fn is_moving(&self, servo: u8) -> bool {
        self.bank.is_moving(servo)
    }

    /// Servos currently advancing
    pub fn moving_mask(&self) -> ServoMask {
        self.bank.moving_mask()
    }

    /// Check if any servo is advancing
    pub fn any_moving(&self) -> bool {
        self.bank.any_moving()
    }

    /// Commanded pulse of a servo
    pub fn current_pulse(&self, servo: u8) -> u16 {
        self.bank.current_pulse(servo)
    }

    /// Commanded angle of a servo
    pub fn current_angle(&self, servo: u8) -> f32 {
        self.bank.current_angle(servo)
    }

    /// Target angle of a servo
    pub fn target_angle(&self, servo: u8) -> f32 {
        self.bank.target_angle(servo)
    }

    /// Ticks left in a servo's trajectory
    pub fn remaining_ticks(&self, servo: u8) -> u32 {
        self.bank.remaining_ticks(servo)
    }
}
