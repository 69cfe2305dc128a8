//! Front-evicting record buffer backing [`SlidingWindow`](super::SlidingWindow).
//!
//! Records are appended at the back in key order and only ever leave from
//! the front, so eviction is a head-index bump. Dead slots are reclaimed in
//! bulk once they dominate the buffer.

/// Dead-slot count above which the buffer may be compacted.
const COMPACT_AFTER: usize = 4096;

/// Append-at-back, evict-at-front buffer.
///
/// A `Vec` plus head index keeps the live records contiguous, which
/// `as_slice` and candidate scans rely on.
#[derive(Debug)]
pub struct ActiveSet<T> {
    slots: Vec<T>,
    /// First live slot; everything before it is evicted.
    head: usize,
    peak: usize,
}

impl<T> Default for ActiveSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ActiveSet<T> {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            peak: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, record: T) {
        self.slots.push(record);
        self.peak = self.peak.max(self.len());
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live records, oldest first.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.slots[self.head..]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    /// Evict records from the front while `evict` holds.
    ///
    /// Returns how many were evicted.
    pub fn advance_while<F>(&mut self, mut evict: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let evicted = self.as_slice().iter().take_while(|r| evict(r)).count();
        self.head += evicted;

        if self.head > COMPACT_AFTER && self.head * 2 > self.slots.len() {
            self.slots.drain(..self.head);
            self.head = 0;
        }
        evicted
    }

    /// Largest number of live records seen at once.
    pub fn max_active(&self) -> usize {
        self.peak
    }
}
