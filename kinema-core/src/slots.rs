//! Fixed-capacity slot allocator
//!
//! Groups and cycles both live in small arenas addressed by a stable slot
//! index. Allocation scans for the first free slot; freeing a slot makes it
//! immediately reusable.

/// Fixed-size table of optional entries
#[derive(Debug, Clone)]
pub struct SlotTable<T, const N: usize> {
    slots: [Option<T>; N],
}

impl<T, const N: usize> Default for SlotTable<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> SlotTable<T, N> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Table capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Check if no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Check if every slot is occupied
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Store `value` in the first free slot
    ///
    /// Returns the slot index, or hands the value back when the table is full.
    pub fn insert(&mut self, value: T) -> Result<usize, T> {
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(value);
                Ok(index)
            }
            None => Err(value),
        }
    }

    /// Borrow the entry in `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Mutably borrow the entry in `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Free slot `index`, returning its entry
    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Index of the first occupied slot matching `pred`
    pub fn position<F>(&self, mut pred: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(&mut pred))
    }

    /// Iterate occupied slots with their index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }

    /// Iterate occupied slots mutably with their index
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (i, v)))
    }

    /// Free every slot
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}
