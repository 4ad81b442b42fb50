//! Motion events and cycle state machine
//!
//! Completion propagates synchronously: a tick finishes servos, finished
//! servos complete groups, completed groups advance cycles. Observers see
//! the resulting [`MotionEvent`]s in that order.

pub mod events;
pub mod machine;

pub use events::*;
pub use machine::*;
