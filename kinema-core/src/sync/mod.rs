//! Synchronization groups
//!
//! A group claims a set of servos all-or-nothing, starts their moves with a
//! shared duration and completes exactly once, when the last member
//! finishes.

pub mod group;
pub mod manager;

pub use group::{GroupId, GroupOwner, SyncGroup};
pub use manager::{CompletedGroup, SyncManager};
