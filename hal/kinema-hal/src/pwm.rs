//! Servo PWM output abstractions
//!
//! Hobby servos are driven by a 50 Hz pulse train whose high time (typically
//! 500-2500 µs) encodes the commanded position.

use embedded_hal::pwm::SetDutyCycle;

/// Servo frame period in microseconds (50 Hz)
pub const SERVO_PERIOD_US: u32 = 20_000;

/// Pulse-width output for a bank of servo channels
///
/// Implementations translate a pulse width into whatever the hardware needs
/// (compare value, duty fraction, ...). Writes to unknown channels are ignored.
pub trait ServoPwm {
    /// Drive `channel` with a pulse of `pulse_us` microseconds
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16);
}

impl<T: ServoPwm + ?Sized> ServoPwm for &mut T {
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) {
        (**self).set_pulse_us(channel, pulse_us);
    }
}

/// Adapter driving servo pulses through `embedded-hal` duty-cycle channels
///
/// Each channel must be configured for a [`SERVO_PERIOD_US`] period; the
/// pulse width is scaled into the channel's duty range.
pub struct DutyCyclePwm<C, const N: usize> {
    channels: [C; N],
}

impl<C: SetDutyCycle, const N: usize> DutyCyclePwm<C, N> {
    /// Wrap a set of duty-cycle channels, indexed by servo id
    pub fn new(channels: [C; N]) -> Self {
        Self { channels }
    }

    /// Borrow the underlying channels
    pub fn channels(&self) -> &[C; N] {
        &self.channels
    }

    /// Convert a pulse width into a duty value for a channel with `max_duty`
    pub fn duty_for(pulse_us: u16, max_duty: u16) -> u16 {
        let duty = (pulse_us as u32 * max_duty as u32) / SERVO_PERIOD_US;
        duty.min(max_duty as u32) as u16
    }
}

impl<C: SetDutyCycle, const N: usize> ServoPwm for DutyCyclePwm<C, N> {
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) {
        let Some(ch) = self.channels.get_mut(channel as usize) else {
            return;
        };
        let duty = Self::duty_for(pulse_us, ch.max_duty_cycle());
        // A rejected duty leaves the previous pulse on the pin; the next
        // trajectory step retries.
        let _ = ch.set_duty_cycle(duty);
    }
}

/// Recording servo backend for host tests
///
/// Remembers the last pulse written to every channel and counts writes.
#[derive(Debug, Clone)]
pub struct MockPwm<const N: usize> {
    /// Last pulse written per channel (`None` until first write)
    pub pulses: [Option<u16>; N],
    /// Total number of writes per channel
    pub writes: [u32; N],
}

impl<const N: usize> Default for MockPwm<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MockPwm<N> {
    /// Create a backend with no recorded output
    pub const fn new() -> Self {
        Self {
            pulses: [None; N],
            writes: [0; N],
        }
    }

    /// Last pulse written to `channel`
    pub fn pulse(&self, channel: u8) -> Option<u16> {
        self.pulses.get(channel as usize).copied().flatten()
    }

    /// Number of writes to `channel`
    pub fn write_count(&self, channel: u8) -> u32 {
        self.writes.get(channel as usize).copied().unwrap_or(0)
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.pulses = [None; N];
        self.writes = [0; N];
    }
}

impl<const N: usize> ServoPwm for MockPwm<N> {
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) {
        let idx = channel as usize;
        if idx < N {
            self.pulses[idx] = Some(pulse_us);
            self.writes[idx] += 1;
        }
    }
}
