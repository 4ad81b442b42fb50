//! Inter-task communication channels
//!
//! Motion events leave the critical section as values and are fanned out
//! from here.

use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use kinema_core::config::MAX_EVENTS_PER_TICK;
use kinema_core::state::{CycleStatusUpdate, MotionEvent};
use kinema_core::sync::GroupId;

/// Channel capacity for motion events (two ticks' worst case)
const EVENT_CHANNEL_SIZE: usize = 2 * MAX_EVENTS_PER_TICK;

/// Completion and cycle events from the motion core
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, MotionEvent, EVENT_CHANNEL_SIZE> =
    Channel::new();

/// Most recent group completion (set by the status task)
pub static GROUP_DONE: Signal<CriticalSectionRawMutex, GroupId> = Signal::new();

/// Most recent cycle status report (set by the status task)
pub static CYCLE_UPDATE: Signal<CriticalSectionRawMutex, CycleStatusUpdate> = Signal::new();

/// Queue an event without blocking
///
/// Usable as a motion observer from inside the controller lock.
pub fn publish(event: MotionEvent) {
    if EVENT_CHANNEL.try_send(event).is_err() {
        warn!("Event channel full, dropped {}", event);
    }
}
