//! Servo bitmask

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::MAX_SERVOS;

/// Set of servo indices, one bit per servo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServoMask(pub u32);

impl ServoMask {
    /// Empty mask
    pub const EMPTY: Self = Self(0);

    /// Mask covering every configured servo
    pub const fn all() -> Self {
        Self((1u32 << MAX_SERVOS) - 1)
    }

    /// Mask with a single servo
    ///
    /// Indices outside the configured servo count yield an empty mask.
    pub const fn single(id: u8) -> Self {
        if (id as usize) < MAX_SERVOS {
            Self(1 << id)
        } else {
            Self::EMPTY
        }
    }

    /// Build a mask from a list of servo ids, skipping out-of-range ids
    pub fn from_ids(ids: &[u8]) -> Self {
        ids.iter()
            .fold(Self::EMPTY, |mask, &id| mask.union(Self::single(id)))
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if no servo is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if `id` is set
    pub const fn contains(self, id: u8) -> bool {
        (id as usize) < MAX_SERVOS && self.0 & (1 << id) != 0
    }

    /// Check if every servo in `other` is also in `self`
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Add `id`
    pub fn insert(&mut self, id: u8) {
        self.0 |= Self::single(id).0;
    }

    /// Remove `id`
    pub fn remove(&mut self, id: u8) {
        self.0 &= !Self::single(id).0;
    }

    /// Union of two masks
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Servos in `self` but not in `other`
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Servos in both masks
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Number of servos set
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate set servo indices in ascending order
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..MAX_SERVOS as u8).filter(move |&id| self.contains(id))
    }
}

impl From<u32> for ServoMask {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}
