//! Critical-section wrapper for the controller
//!
//! The tick task and command handling both mutate the servo, group and cycle
//! tables. Every access goes through [`SharedMotion::lock`], which holds the
//! mutex for the duration of the closure.
//!
//! Firmware uses `CriticalSectionRawMutex`; host tests use `NoopRawMutex`.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use kinema_hal::ServoPwm;

use crate::controller::MotionController;
use crate::state::EventLog;

/// Controller shared between execution contexts
pub struct SharedMotion<M: RawMutex, P> {
    inner: Mutex<M, RefCell<MotionController<P>>>,
}

impl<M: RawMutex, P: ServoPwm> SharedMotion<M, P> {
    /// Wrap a controller
    pub fn new(controller: MotionController<P>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(controller)),
        }
    }

    /// Run `f` with exclusive access to the controller
    ///
    /// `f` must not call `lock` again.
    pub fn lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut MotionController<P>) -> R,
    {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Run `f` with shared access to the controller
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&MotionController<P>) -> R,
    {
        self.inner.lock(|cell| f(&cell.borrow()))
    }

    /// Advance one tick and return the events it produced
    pub fn tick<const N: usize>(&self) -> EventLog<N> {
        let mut log = EventLog::new();
        self.lock(|motion| motion.tick(&mut log));
        log
    }
}
