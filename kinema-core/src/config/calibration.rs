//! Servo calibration record
//!
//! Stores one [`ServoProfile`] per channel with a header and checksum so it
//! can be persisted to flash and reloaded on boot.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::profile::ServoProfile;
use super::MAX_SERVOS;
#[cfg(feature = "serde")]
use crate::error::MotionError;

/// Magic number to identify valid calibration data
pub const CALIBRATION_MAGIC: u32 = 0x53525643; // "SRVC"

/// Current calibration data version
pub const CALIBRATION_VERSION: u8 = 1;

/// Upper bound of an encoded record in bytes
pub const CALIBRATION_MAX_ENCODED: usize = 160;

/// Complete calibration data stored in flash
///
/// This struct is serialized using postcard.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationData {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Per-servo profiles, indexed by servo id
    pub profiles: [ServoProfile; MAX_SERVOS],
    /// CRC32 checksum (calculated over magic..profiles)
    pub crc: u32,
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationData {
    /// Create a record with default profiles on every channel
    pub const fn new() -> Self {
        Self::from_profiles([ServoProfile::DEFAULT; MAX_SERVOS])
    }

    /// Create a record from explicit profiles
    ///
    /// The CRC is left at zero; call [`CalibrationData::update_crc`] before
    /// persisting.
    pub const fn from_profiles(profiles: [ServoProfile; MAX_SERVOS]) -> Self {
        Self {
            magic: CALIBRATION_MAGIC,
            version: CALIBRATION_VERSION,
            profiles,
            crc: 0,
        }
    }

    /// Check if the header is valid (magic and version match)
    pub fn is_valid(&self) -> bool {
        self.magic == CALIBRATION_MAGIC && self.version == CALIBRATION_VERSION
    }

    /// Get the profile for a servo
    pub fn get(&self, servo: u8) -> Option<&ServoProfile> {
        self.profiles.get(servo as usize)
    }

    /// Set the profile for a servo
    ///
    /// Returns false if the servo index is out of range.
    pub fn set(&mut self, servo: u8, profile: ServoProfile) -> bool {
        match self.profiles.get_mut(servo as usize) {
            Some(slot) => {
                *slot = profile;
                true
            }
            None => false,
        }
    }

    /// Calculate CRC32 for the data (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFFFFFF;

        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);

        for p in &self.profiles {
            crc = crc32_update(crc, &p.min_pulse.to_le_bytes());
            crc = crc32_update(crc, &p.mid_pulse.to_le_bytes());
            crc = crc32_update(crc, &p.max_pulse.to_le_bytes());
            crc = crc32_update(crc, &p.min_angle.to_le_bytes());
            crc = crc32_update(crc, &p.mid_angle.to_le_bytes());
            crc = crc32_update(crc, &p.max_angle.to_le_bytes());
        }

        !crc
    }

    /// Update the CRC field
    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }

    /// Serialize into `buf`, refreshing the CRC first
    ///
    /// Returns the used prefix of `buf`.
    #[cfg(feature = "serde")]
    pub fn encode<'a>(&mut self, buf: &'a mut [u8]) -> Result<&'a mut [u8], MotionError> {
        self.update_crc();
        postcard::to_slice(self, buf).map_err(|_| MotionError::Serialization)
    }

    /// Deserialize a record, rejecting bad headers and checksums
    #[cfg(feature = "serde")]
    pub fn decode(bytes: &[u8]) -> Result<Self, MotionError> {
        let data: Self = postcard::from_bytes(bytes).map_err(|_| MotionError::Serialization)?;
        if !data.is_valid() || !data.verify_crc() {
            return Err(MotionError::InvalidConfig);
        }
        Ok(data)
    }
}

/// Simple CRC32 update function (IEEE 802.3 polynomial)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB88320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
