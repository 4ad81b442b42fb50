//! Motion event definitions
//!
//! Events replace per-move callbacks: a move, group or cycle opts in with
//! [`Notify::Emit`] and the resulting completions are handed to the
//! [`MotionObserver`] passed into the operation that produced them.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sync::GroupId;

/// Whether a move, group or cycle reports its progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Notify {
    /// No events
    #[default]
    Silent,
    /// Emit completion/status events
    Emit,
}

impl Notify {
    /// Check if events should be emitted
    pub fn is_emit(self) -> bool {
        matches!(self, Notify::Emit)
    }
}

/// Cycle progress snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CycleStatusUpdate {
    /// Cycle slot index
    pub cycle: u8,
    /// Completed loops
    pub loop_count: u32,
    /// Loop limit (0 = unbounded)
    pub max_loops: u32,
    /// Pose currently being played (or about to be)
    pub pose_index: u8,
    /// True once the cycle stopped for good
    pub finished: bool,
}

impl CycleStatusUpdate {
    /// Loops left before the cycle finishes (`None` when unbounded)
    pub fn remaining_loops(&self) -> Option<u32> {
        if self.max_loops == 0 {
            None
        } else {
            Some(self.max_loops.saturating_sub(self.loop_count))
        }
    }
}

/// Events produced by the motion core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MotionEvent {
    /// A single-servo move requested with [`Notify::Emit`] finished or was stopped
    ServoComplete {
        /// Servo index
        servo: u8,
    },
    /// Every servo of a group finished
    GroupComplete {
        /// Completed group
        group: GroupId,
    },
    /// Cycle progress report
    CycleStatus(CycleStatusUpdate),
}

impl MotionEvent {
    /// Check if this is a servo completion
    pub fn is_servo_complete(&self) -> bool {
        matches!(self, MotionEvent::ServoComplete { .. })
    }

    /// Check if this is a group completion
    pub fn is_group_complete(&self) -> bool {
        matches!(self, MotionEvent::GroupComplete { .. })
    }

    /// Check if this is the final report of a cycle
    pub fn is_cycle_finished(&self) -> bool {
        matches!(self, MotionEvent::CycleStatus(s) if s.finished)
    }
}

/// Receiver of motion events
///
/// Implemented for any `FnMut(MotionEvent)` closure and for [`EventLog`].
/// Observers run inside the controller's critical section and must not
/// call back into it.
pub trait MotionObserver {
    /// Handle one event
    fn on_event(&mut self, event: MotionEvent);
}

impl<F: FnMut(MotionEvent)> MotionObserver for F {
    fn on_event(&mut self, event: MotionEvent) {
        self(event)
    }
}

/// Bounded event buffer
///
/// Collects events produced under the lock so they can be forwarded after
/// it is released. Events beyond capacity are counted and dropped.
#[derive(Debug, Clone, Default)]
pub struct EventLog<const N: usize> {
    events: Vec<MotionEvent, N>,
    dropped: u32,
}

impl<const N: usize> EventLog<N> {
    /// Create an empty log
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            dropped: 0,
        }
    }

    /// Recorded events in arrival order
    pub fn events(&self) -> &[MotionEvent] {
        &self.events
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events lost to a full buffer
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Iterate recorded events
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &MotionEvent> {
        self.events.iter()
    }

    /// Forget all events and the drop counter
    pub fn clear(&mut self) {
        self.events.clear();
        self.dropped = 0;
    }
}

impl<const N: usize> MotionObserver for EventLog<N> {
    fn on_event(&mut self, event: MotionEvent) {
        if self.events.push(event).is_err() {
            self.dropped = self.dropped.saturating_add(1);
        }
    }
}
