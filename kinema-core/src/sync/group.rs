//! Group records

use core::num::NonZeroU32;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::motion::ServoMask;
use crate::state::Notify;

/// Identifier of a synchronization group
///
/// Ids increase monotonically from 1; the raw value 0 is reserved as the
/// "no group" marker on the wire and is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupId(NonZeroU32);

impl GroupId {
    /// First id handed out
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Wrap a raw id (`None` for 0)
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Raw id value
    pub const fn raw(self) -> u32 {
        self.0.get()
    }

    /// Following id, wrapping past `u32::MAX` back to 1
    pub fn next(self) -> Self {
        Self(self.0.checked_add(1).unwrap_or(NonZeroU32::MIN))
    }
}

/// Who is notified when a group completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GroupOwner {
    /// External caller; emits `GroupComplete` when asked to
    External(Notify),
    /// Pose of the cycle in this slot
    Cycle(u8),
}

/// Active group record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncGroup {
    /// Group id
    pub id: GroupId,
    /// Servos claimed at creation
    pub claimed: ServoMask,
    /// Claimed servos that already finished (always within `claimed`)
    pub done: ServoMask,
    /// Completion routing
    pub owner: GroupOwner,
}

impl SyncGroup {
    /// Create a record with nothing finished yet
    pub const fn new(id: GroupId, claimed: ServoMask, owner: GroupOwner) -> Self {
        Self {
            id,
            claimed,
            done: ServoMask::EMPTY,
            owner,
        }
    }

    /// Claimed servos still running
    pub const fn pending(&self) -> ServoMask {
        self.claimed.difference(self.done)
    }

    /// Check if every claimed servo finished
    pub const fn is_complete(&self) -> bool {
        self.done.contains_all(self.claimed)
    }
}
