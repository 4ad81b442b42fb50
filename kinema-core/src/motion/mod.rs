//! Servo trajectory interpolation
//!
//! Converts angle or pulse targets plus a duration into eased pulse
//! trajectories advanced one tick at a time.

pub mod easing;
pub mod mask;
pub mod servo;

pub use easing::ease;
pub use mask::ServoMask;
pub use servo::{ServoBank, ServoMotion};
