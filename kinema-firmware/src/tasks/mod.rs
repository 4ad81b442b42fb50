//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod demo;
pub mod status;
pub mod tick;

pub use demo::demo_task;
pub use status::status_task;
pub use tick::tick_task;
