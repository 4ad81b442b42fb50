//! Kinema - Servo Motion Controller Firmware
//!
//! Main firmware binary for RP2040-based robot arms. Drives six hobby
//! servos from the motion core on a 1 ms tick.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::pwm::{Config as PwmConfig, Pwm, PwmOutput};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use kinema_core::config::MAX_SERVOS;
use kinema_core::{MotionController, SharedMotion};
use kinema_hal::{DutyCyclePwm, SERVO_PERIOD_US};

mod channels;
mod config;
mod tasks;

/// PWM outputs indexed by servo channel
pub type ServoOutputs = DutyCyclePwm<PwmOutput<'static>, MAX_SERVOS>;

/// Controller shared between the tick task and command tasks
pub type Motion = SharedMotion<CriticalSectionRawMutex, ServoOutputs>;

static MOTION: StaticCell<Motion> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Kinema firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Servo pins are board-specific: GPIO0-5 on PWM slices 0-2
    let (s0, s1) = split_pair(Pwm::new_output_ab(p.PWM_SLICE0, p.PIN_0, p.PIN_1, servo_pwm_config()));
    let (s2, s3) = split_pair(Pwm::new_output_ab(p.PWM_SLICE1, p.PIN_2, p.PIN_3, servo_pwm_config()));
    let (s4, s5) = split_pair(Pwm::new_output_ab(p.PWM_SLICE2, p.PIN_4, p.PIN_5, servo_pwm_config()));
    let outputs = DutyCyclePwm::new([s0, s1, s2, s3, s4, s5]);
    info!("Servo PWM initialized");

    let mut controller = MotionController::new(outputs);
    if let Err(e) = controller.apply_calibration(&config::calibration()) {
        warn!("Build-time calibration rejected ({}), using defaults", e);
    }
    for servo in 0..MAX_SERVOS as u8 {
        let profile = controller.profile(servo);
        debug!(
            "{}: {}-{} us, {}-{} deg",
            config::servo_name(servo),
            profile.min_pulse,
            profile.max_pulse,
            profile.min_angle,
            profile.max_angle
        );
    }

    // Hold every servo at its home pulse before any motion
    controller.sync_to_hardware();
    let motion: &'static Motion = MOTION.init(SharedMotion::new(controller));

    spawner.spawn(tasks::tick_task(motion)).unwrap();
    spawner.spawn(tasks::status_task()).unwrap();
    spawner.spawn(tasks::demo_task(motion)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// 50 Hz servo frame with one counter step per microsecond
fn servo_pwm_config() -> PwmConfig {
    let mut config = PwmConfig::default();
    // 125 MHz system clock / 125 = 1 MHz
    config.divider = 125u8.into();
    config.top = (SERVO_PERIOD_US - 1) as u16;
    config
}

/// Split a slice into its A and B outputs
fn split_pair(pwm: Pwm<'static>) -> (PwmOutput<'static>, PwmOutput<'static>) {
    let (a, b) = pwm.split();
    (unwrap!(a), unwrap!(b))
}
