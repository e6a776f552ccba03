/// Cursor bookkeeping for a fixed ring of slots.
///
/// `put` is the slot written next (always the oldest once the ring has wrapped),
/// `newest` the slot written last. The storage itself lives with the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircularIndex {
    capacity: usize,
    put: usize,
    newest: Option<usize>,
    filled: bool,
}

impl CircularIndex {
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            put: 0,
            newest: None,
            filled: false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn put(&self) -> usize {
        self.put
    }

    #[inline]
    pub fn newest(&self) -> Option<usize> {
        self.newest
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.newest.is_none()
    }

    /// True once every slot has been written at least once.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled
    }

    /// Marks the slot at `put` as written and moves both cursors forward.
    pub fn advance(&mut self) {
        match self.newest {
            None => {
                self.put = 1 % self.capacity;
                self.newest = Some(0);
                self.filled = self.capacity == 1;
            }
            Some(newest) => {
                self.put = (self.put + 1) % self.capacity;
                self.newest = Some((newest + 1) % self.capacity);

                if self.put == 0 {
                    self.filled = true;
                }
            }
        }
    }

    /// Slot holding the entry written `age` insertions ago (0 = newest).
    #[inline]
    pub fn slot_by_age(&self, age: usize) -> Option<usize> {
        let newest = self.newest?;

        Some((newest + self.capacity - age % self.capacity) % self.capacity)
    }
}
