//! Servo calibration profile
//!
//! Maps the servo's mechanical angle range onto its pulse-width range.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default minimum pulse width (µs)
pub const DEFAULT_MIN_PULSE: u16 = 500;
/// Default centre pulse width (µs)
pub const DEFAULT_MID_PULSE: u16 = 1500;
/// Default maximum pulse width (µs)
pub const DEFAULT_MAX_PULSE: u16 = 2500;
/// Default minimum angle (degrees)
pub const DEFAULT_MIN_ANGLE: f32 = 0.0;
/// Default centre angle (degrees)
pub const DEFAULT_MID_ANGLE: f32 = 135.0;
/// Default maximum angle (degrees)
pub const DEFAULT_MAX_ANGLE: f32 = 270.0;

/// Angle spans narrower than this are treated as degenerate
const MIN_ANGLE_SPAN: f32 = 0.001;

/// Calibration for a single servo
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServoProfile {
    /// Pulse width at `min_angle` (µs)
    pub min_pulse: u16,
    /// Pulse width of the home position (µs)
    pub mid_pulse: u16,
    /// Pulse width at `max_angle` (µs)
    pub max_pulse: u16,
    /// Lowest reachable angle (degrees)
    pub min_angle: f32,
    /// Home angle (degrees)
    pub mid_angle: f32,
    /// Highest reachable angle (degrees)
    pub max_angle: f32,
}

impl Default for ServoProfile {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl ServoProfile {
    /// 270° servo, 500-2500 µs
    pub const DEFAULT: Self = Self {
        min_pulse: DEFAULT_MIN_PULSE,
        mid_pulse: DEFAULT_MID_PULSE,
        max_pulse: DEFAULT_MAX_PULSE,
        min_angle: DEFAULT_MIN_ANGLE,
        mid_angle: DEFAULT_MID_ANGLE,
        max_angle: DEFAULT_MAX_ANGLE,
    };

    /// Create a profile from pulse and angle ranges
    ///
    /// The home position is the centre of both ranges. The result is not
    /// validated; see [`ServoProfile::validated`].
    pub fn new(min_pulse: u16, max_pulse: u16, min_angle: f32, max_angle: f32) -> Self {
        Self {
            min_pulse,
            mid_pulse: min_pulse + (max_pulse.saturating_sub(min_pulse)) / 2,
            max_pulse,
            min_angle,
            mid_angle: (min_angle + max_angle) / 2.0,
            max_angle,
        }
    }

    /// Return a corrected copy of this profile
    ///
    /// - `min_pulse >= max_pulse` resets the pulse triple to 500/1500/2500
    /// - a `mid_pulse` outside the pulse range is re-centred
    /// - a `mid_angle` outside the angle range is re-centred
    pub fn validated(self) -> Self {
        let mut p = self;

        if p.min_pulse >= p.max_pulse {
            p.min_pulse = DEFAULT_MIN_PULSE;
            p.mid_pulse = DEFAULT_MID_PULSE;
            p.max_pulse = DEFAULT_MAX_PULSE;
        }

        if p.mid_pulse < p.min_pulse || p.mid_pulse > p.max_pulse {
            p.mid_pulse = p.min_pulse + (p.max_pulse - p.min_pulse) / 2;
        }

        // Negated form also catches NaN
        if !(p.mid_angle >= p.min_angle && p.mid_angle <= p.max_angle) {
            p.mid_angle = (p.min_angle + p.max_angle) / 2.0;
        }

        p
    }

    /// Check whether the pulse bounds are usable as-is
    pub fn is_valid(&self) -> bool {
        self.min_pulse < self.max_pulse
            && self.mid_pulse >= self.min_pulse
            && self.mid_pulse <= self.max_pulse
    }

    /// Clamp a pulse width into the calibrated range
    pub fn clamp_pulse(&self, pulse: u16) -> u16 {
        if pulse < self.min_pulse {
            self.min_pulse
        } else if pulse > self.max_pulse {
            self.max_pulse
        } else {
            pulse
        }
    }

    /// Clamp an angle into the calibrated range
    pub fn clamp_angle(&self, angle: f32) -> f32 {
        if angle < self.min_angle {
            self.min_angle
        } else if angle > self.max_angle {
            self.max_angle
        } else {
            angle
        }
    }

    /// Convert an angle to the nearest pulse width
    ///
    /// The angle is clamped into range first. A degenerate angle span
    /// returns `mid_pulse`.
    pub fn angle_to_pulse(&self, angle: f32) -> u16 {
        let span = self.max_angle - self.min_angle;
        if !(span >= MIN_ANGLE_SPAN) {
            return self.mid_pulse;
        }

        let angle = self.clamp_angle(angle);
        let mut ratio = (angle - self.min_angle) / span;
        if !(ratio > 0.0) {
            ratio = 0.0;
        } else if ratio > 1.0 {
            ratio = 1.0;
        }

        let pulse_span = self.max_pulse.saturating_sub(self.min_pulse) as f32;
        let offset = libm::roundf(ratio * pulse_span) as u16;
        self.min_pulse.saturating_add(offset)
    }

    /// Convert a pulse width to an angle
    ///
    /// The pulse is clamped into range first. A zero-width pulse span
    /// returns `mid_angle`.
    pub fn pulse_to_angle(&self, pulse: u16) -> f32 {
        let pulse_span = self.max_pulse.saturating_sub(self.min_pulse);
        if pulse_span == 0 {
            return self.mid_angle;
        }

        let pulse = self.clamp_pulse(pulse);
        let ratio = (pulse - self.min_pulse) as f32 / pulse_span as f32;
        self.min_angle + ratio * (self.max_angle - self.min_angle)
    }
}
