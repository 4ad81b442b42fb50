//! Build-time servo calibration
//!
//! `servos.toml` is validated by the build script and compiled into
//! `SERVO_NAMES` and `SERVO_PROFILES`.

use kinema_core::config::{CalibrationData, ServoProfile};

include!(concat!(env!("OUT_DIR"), "/servos.rs"));

/// Calibration record for every channel
pub fn calibration() -> CalibrationData {
    let mut data = CalibrationData::from_profiles(SERVO_PROFILES);
    data.update_crc();
    data
}

/// Configured name of a servo channel
pub fn servo_name(servo: u8) -> &'static str {
    SERVO_NAMES.get(servo as usize).copied().unwrap_or("?")
}
