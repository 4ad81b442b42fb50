//! Kinema Hardware Abstraction Layer
//!
//! This crate defines the hardware seam between the motion core and the
//! chip-specific PWM peripherals. The core only ever needs one primitive:
//! "drive servo channel N with a pulse of P microseconds".
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  kinema-core (interpolation, groups)    │
//! └─────────────────────────────────────────┘
//!                     │  ServoPwm
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  kinema-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │  embedded-hal SetDutyCycle
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  chip HAL (embassy-rp PwmOutput, ...)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`pwm::ServoPwm`] - Pulse-width output for servo channels
//! - [`pwm::DutyCyclePwm`] - Adapter over `embedded-hal` duty-cycle channels
//! - [`pwm::MockPwm`] - Recording backend for host tests

#![no_std]
#![deny(unsafe_code)]

pub mod pwm;

pub use pwm::{DutyCyclePwm, MockPwm, ServoPwm, SERVO_PERIOD_US};
