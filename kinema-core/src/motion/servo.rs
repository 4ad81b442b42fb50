//! Per-servo trajectory interpolator
//!
//! Each servo slot holds its calibration and at most one trajectory. A
//! trajectory is a countdown of ticks; every tick the pulse is recomputed
//! from the eased progress and written to the PWM backend when it changes.
//!
//! Out-of-range servo indices are no-ops returning benign defaults.

use kinema_hal::ServoPwm;

use super::easing::ease;
use super::mask::ServoMask;
use crate::config::{ServoProfile, DEFAULT_MID_ANGLE, DEFAULT_MID_PULSE, MAX_SERVOS};
use crate::state::{MotionEvent, MotionObserver, Notify};

/// Trajectory state for one servo
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoMotion {
    /// Calibration
    pub profile: ServoProfile,
    /// Pulse currently commanded (µs)
    pub current_pulse: u16,
    /// Pulse the trajectory ends at (µs)
    pub target_pulse: u16,
    /// Pulse the trajectory started from (µs)
    pub start_pulse: u16,
    /// Trajectory length in ticks
    pub total_ticks: u32,
    /// Ticks left in the trajectory
    pub remaining_ticks: u32,
    /// Trajectory advancing
    pub moving: bool,
    /// Trajectory frozen by `pause`
    pub paused: bool,
    /// Completion reporting for the current move
    pub notify: Notify,
}

impl Default for ServoMotion {
    fn default() -> Self {
        Self::new(ServoProfile::DEFAULT)
    }
}

impl ServoMotion {
    /// Create an idle servo resting at the profile's home pulse
    pub const fn new(profile: ServoProfile) -> Self {
        Self {
            profile,
            current_pulse: profile.mid_pulse,
            target_pulse: profile.mid_pulse,
            start_pulse: profile.mid_pulse,
            total_ticks: 0,
            remaining_ticks: 0,
            moving: false,
            paused: false,
            notify: Notify::Silent,
        }
    }

    /// Pulse for the current progress of the trajectory
    fn interpolate(&self) -> u16 {
        let progress = 1.0 - self.remaining_ticks as f32 / self.total_ticks as f32;
        let span = self.target_pulse as i32 - self.start_pulse as i32;
        let pulse = self.start_pulse as i32 + (span as f32 * ease(progress)) as i32;
        pulse.clamp(0, u16::MAX as i32) as u16
    }
}

/// All servo trajectories
#[derive(Debug, Clone)]
pub struct ServoBank {
    servos: [ServoMotion; MAX_SERVOS],
}

impl Default for ServoBank {
    fn default() -> Self {
        Self::new()
    }
}

impl ServoBank {
    /// Create a bank with default calibration, every servo idle at 1500 µs
    ///
    /// Nothing is written to the outputs until [`ServoBank::sync_to_hardware`].
    pub const fn new() -> Self {
        Self {
            servos: [ServoMotion::new(ServoProfile::DEFAULT); MAX_SERVOS],
        }
    }

    /// Borrow a servo's state
    pub fn servo(&self, id: u8) -> Option<&ServoMotion> {
        self.servos.get(id as usize)
    }

    fn servo_mut(&mut self, id: u8) -> Option<&mut ServoMotion> {
        self.servos.get_mut(id as usize)
    }

    /// Replace a servo's calibration
    ///
    /// Invalid bounds fall back to defaults (see [`ServoProfile::validated`]).
    /// The current trajectory keeps running. Returns false for unknown ids.
    pub fn configure(&mut self, id: u8, profile: ServoProfile) -> bool {
        let Some(servo) = self.servo_mut(id) else {
            return false;
        };
        let validated = profile.validated();
        if validated != profile {
            warn!("servo {}: calibration corrected", id);
        }
        servo.profile = validated;
        true
    }

    /// Calibration of a servo (defaults for unknown ids)
    pub fn profile(&self, id: u8) -> ServoProfile {
        self.servo(id).map(|s| s.profile).unwrap_or_default()
    }

    /// Convert an angle to a pulse using a servo's calibration
    pub fn angle_to_pulse(&self, id: u8, angle: f32) -> u16 {
        self.servo(id)
            .map(|s| s.profile.angle_to_pulse(angle))
            .unwrap_or(DEFAULT_MID_PULSE)
    }

    /// Convert a pulse to an angle using a servo's calibration
    pub fn pulse_to_angle(&self, id: u8, pulse: u16) -> f32 {
        self.servo(id)
            .map(|s| s.profile.pulse_to_angle(pulse))
            .unwrap_or(DEFAULT_MID_ANGLE)
    }

    /// Begin a move to `target_pulse` over `duration` ticks
    ///
    /// The target is clamped into the calibrated range. A target equal to
    /// the current pulse cancels any motion and schedules nothing: no
    /// completion will follow. A duration of 0 completes on the next tick.
    ///
    /// Returns true if a trajectory was scheduled.
    pub fn begin_move(&mut self, id: u8, target_pulse: u16, duration: u32, notify: Notify) -> bool {
        let Some(servo) = self.servo_mut(id) else {
            return false;
        };

        let target = servo.profile.clamp_pulse(target_pulse);
        if target == servo.current_pulse {
            servo.moving = false;
            servo.paused = false;
            return false;
        }

        servo.start_pulse = servo.current_pulse;
        servo.target_pulse = target;
        servo.total_ticks = duration;
        servo.remaining_ticks = duration;
        servo.moving = true;
        servo.paused = false;
        servo.notify = notify;
        true
    }

    /// Hold the current pulse for `duration` ticks, then complete
    ///
    /// Used for group members that are already at their target so the group
    /// still finishes after its shared duration.
    pub fn hold(&mut self, id: u8, duration: u32, notify: Notify) -> bool {
        let Some(servo) = self.servo_mut(id) else {
            return false;
        };

        servo.start_pulse = servo.current_pulse;
        servo.target_pulse = servo.current_pulse;
        servo.total_ticks = duration;
        servo.remaining_ticks = duration;
        servo.moving = true;
        servo.paused = false;
        servo.notify = notify;
        true
    }

    /// Begin a move to an angle (see [`ServoBank::begin_move`])
    pub fn move_angle(&mut self, id: u8, angle: f32, duration: u32, notify: Notify) -> bool {
        if id as usize >= MAX_SERVOS {
            return false;
        }
        let pulse = self.angle_to_pulse(id, angle);
        self.begin_move(id, pulse, duration, notify)
    }

    /// Move by `delta` degrees relative to the current angle
    pub fn move_relative(&mut self, id: u8, delta: f32, duration: u32, notify: Notify) -> bool {
        if id as usize >= MAX_SERVOS {
            return false;
        }
        let angle = self.current_angle(id) + delta;
        self.move_angle(id, angle, duration, notify)
    }

    /// Move to the calibrated home angle
    pub fn move_home(&mut self, id: u8, duration: u32, notify: Notify) -> bool {
        let Some(servo) = self.servo(id) else {
            return false;
        };
        let home = servo.profile.mid_angle;
        self.move_angle(id, home, duration, notify)
    }

    /// Begin independent pulse moves sharing one duration
    ///
    /// Each move stands alone; a rejected id does not affect the others.
    /// Returns the servos that were scheduled.
    pub fn move_pulse_many(&mut self, moves: &[(u8, u16)], duration: u32, notify: Notify) -> ServoMask {
        let mut scheduled = ServoMask::EMPTY;
        for &(id, pulse) in moves {
            if self.begin_move(id, pulse, duration, notify) {
                scheduled.insert(id);
            }
        }
        scheduled
    }

    /// Begin independent angle moves sharing one duration
    pub fn move_angle_many(&mut self, moves: &[(u8, f32)], duration: u32, notify: Notify) -> ServoMask {
        let mut scheduled = ServoMask::EMPTY;
        for &(id, angle) in moves {
            if self.move_angle(id, angle, duration, notify) {
                scheduled.insert(id);
            }
        }
        scheduled
    }

    /// Advance every trajectory by one tick
    ///
    /// Finished servos snap to their target, the target is written out and
    /// [`MotionEvent::ServoComplete`] is emitted for moves that asked for it.
    /// Returns the servos that completed during this tick.
    pub fn tick<P: ServoPwm, O: MotionObserver>(&mut self, pwm: &mut P, observer: &mut O) -> ServoMask {
        let mut completed = ServoMask::EMPTY;

        for (id, servo) in self.servos.iter_mut().enumerate() {
            if !servo.moving {
                continue;
            }

            servo.remaining_ticks = servo.remaining_ticks.saturating_sub(1);

            if servo.remaining_ticks == 0 {
                servo.current_pulse = servo.target_pulse;
                servo.moving = false;
                pwm.set_pulse_us(id as u8, servo.target_pulse);
                if servo.notify.is_emit() {
                    observer.on_event(MotionEvent::ServoComplete { servo: id as u8 });
                }
                completed.insert(id as u8);
                continue;
            }

            let pulse = servo.interpolate();
            if pulse != servo.current_pulse {
                servo.current_pulse = pulse;
                pwm.set_pulse_us(id as u8, pulse);
            }
        }

        completed
    }

    /// Stop a servo where it is
    ///
    /// A moving or paused servo runs the normal completion path immediately
    /// (event included), indistinguishable from natural completion. The pulse
    /// is left where it was. Returns true if a completion happened.
    pub fn stop<O: MotionObserver>(&mut self, id: u8, observer: &mut O) -> bool {
        let Some(servo) = self.servo_mut(id) else {
            return false;
        };
        if !servo.moving && !servo.paused {
            return false;
        }

        servo.moving = false;
        servo.paused = false;
        servo.remaining_ticks = 0;
        if servo.notify.is_emit() {
            observer.on_event(MotionEvent::ServoComplete { servo: id });
        }
        true
    }

    /// Stop every servo, returning those that completed
    pub fn stop_all<O: MotionObserver>(&mut self, observer: &mut O) -> ServoMask {
        let mut stopped = ServoMask::EMPTY;
        for id in 0..MAX_SERVOS as u8 {
            if self.stop(id, observer) {
                stopped.insert(id);
            }
        }
        stopped
    }

    /// Freeze a moving servo's countdown
    pub fn pause(&mut self, id: u8) -> bool {
        match self.servo_mut(id) {
            Some(servo) if servo.moving => {
                servo.moving = false;
                servo.paused = true;
                true
            }
            _ => false,
        }
    }

    /// Continue a paused trajectory where its countdown left off
    pub fn resume(&mut self, id: u8) -> bool {
        match self.servo_mut(id) {
            Some(servo) if servo.paused => {
                servo.paused = false;
                servo.moving = true;
                true
            }
            _ => false,
        }
    }

    /// Stop everything without completion and snap to the home pulse
    ///
    /// The home pulse is written out immediately.
    pub fn emergency_stop<P: ServoPwm>(&mut self, pwm: &mut P) {
        for (id, servo) in self.servos.iter_mut().enumerate() {
            servo.moving = false;
            servo.paused = false;
            servo.remaining_ticks = 0;
            servo.current_pulse = servo.profile.mid_pulse;
            servo.target_pulse = servo.profile.mid_pulse;
            pwm.set_pulse_us(id as u8, servo.profile.mid_pulse);
        }
    }

    /// Write every servo's current pulse to the outputs
    pub fn sync_to_hardware<P: ServoPwm>(&self, pwm: &mut P) {
        for (id, servo) in self.servos.iter().enumerate() {
            pwm.set_pulse_us(id as u8, servo.current_pulse);
        }
    }

    /// Check if a servo is advancing
    pub fn is_moving(&self, id: u8) -> bool {
        self.servo(id).is_some_and(|s| s.moving)
    }

    /// Check if a servo is frozen by `pause`
    pub fn is_paused(&self, id: u8) -> bool {
        self.servo(id).is_some_and(|s| s.paused)
    }

    /// Servos currently advancing
    pub fn moving_mask(&self) -> ServoMask {
        let mut mask = ServoMask::EMPTY;
        for (id, servo) in self.servos.iter().enumerate() {
            if servo.moving {
                mask.insert(id as u8);
            }
        }
        mask
    }

    /// Check if any servo is advancing
    pub fn any_moving(&self) -> bool {
        self.servos.iter().any(|s| s.moving)
    }

    /// Commanded pulse (1500 µs for unknown ids)
    pub fn current_pulse(&self, id: u8) -> u16 {
        self.servo(id).map(|s| s.current_pulse).unwrap_or(DEFAULT_MID_PULSE)
    }

    /// Target pulse (1500 µs for unknown ids)
    pub fn target_pulse(&self, id: u8) -> u16 {
        self.servo(id).map(|s| s.target_pulse).unwrap_or(DEFAULT_MID_PULSE)
    }

    /// Commanded angle (135° for unknown ids)
    pub fn current_angle(&self, id: u8) -> f32 {
        self.servo(id)
            .map(|s| s.profile.pulse_to_angle(s.current_pulse))
            .unwrap_or(DEFAULT_MID_ANGLE)
    }

    /// Target angle (135° for unknown ids)
    pub fn target_angle(&self, id: u8) -> f32 {
        self.servo(id)
            .map(|s| s.profile.pulse_to_angle(s.target_pulse))
            .unwrap_or(DEFAULT_MID_ANGLE)
    }

    /// Ticks left in the trajectory (0 for unknown ids)
    pub fn remaining_ticks(&self, id: u8) -> u32 {
        self.servo(id).map(|s| s.remaining_ticks).unwrap_or(0)
    }
}
