use pill_watch_common::frame::GrayFrame;
use std::collections::VecDeque;

/// Smallest window that still holds a frame pair to compare.
pub const MIN_CAPACITY: usize = 2;

/// Fixed-capacity rolling window of the most recent captures, oldest first.
///
/// Each slot holds a frame or `None` when that capture failed; an empty slot
/// still occupies a position so the window keeps its length.
#[derive(Debug)]
pub struct FrameBuffer {
    slots: VecDeque<Option<GrayFrame>>,
    capacity: usize,
}

impl FrameBuffer {
    /// Capacities below [`MIN_CAPACITY`] are raised to it.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Number of slots that actually hold a frame.
    pub fn present(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Append a slot at the newest position. When the window is already full
    /// the oldest slot is evicted first and returned.
    pub fn push(&mut self, slot: Option<GrayFrame>) -> Option<Option<GrayFrame>> {
        let evicted = if self.is_full() {
            self.slots.pop_front()
        } else {
            None
        };
        self.slots.push_back(slot);
        evicted
    }

    /// Evict the oldest slot regardless of fill level.
    pub fn evict_oldest(&mut self) -> Option<Option<GrayFrame>> {
        self.slots.pop_front()
    }

    /// The two newest slots as `(older, newer)`, or `None` with fewer than two slots.
    pub fn newest_pair(&self) -> Option<(Option<&GrayFrame>, Option<&GrayFrame>)> {
        let n = self.slots.len();
        if n < 2 {
            return None;
        }
        Some((self.slots[n - 2].as_ref(), self.slots[n - 1].as_ref()))
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&GrayFrame>> {
        self.slots.iter().map(Option::as_ref)
    }

    /// Capture sequence numbers in buffer order; `None` marks an empty slot.
    pub fn seqs(&self) -> Vec<Option<u64>> {
        self.iter().map(|s| s.map(|f| f.seq)).collect()
    }
}
