//! Board-agnostic motion core for the servo controller firmware
//!
//! This crate contains all motion logic that does not depend on
//! specific hardware implementations:
//!
//! - Servo calibration and angle/pulse conversion
//! - Per-servo trajectory interpolation with easing
//! - Synchronization groups (all-or-nothing servo claims)
//! - Cyclic pose scheduling
//! - The controller facade and its critical-section wrapper
//!
//! Everything is driven by a fixed 1 ms tick. Durations are expressed in
//! ticks throughout.

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod log;

pub mod arm;
pub mod config;
pub mod controller;
pub mod error;
pub mod motion;
pub mod scheduler;
pub mod shared;
pub mod slots;
pub mod state;
pub mod sync;

pub use controller::MotionController;
pub use error::MotionError;
pub use shared::SharedMotion;
