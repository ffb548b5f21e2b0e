//! Fixed-geometry buffer pool for deferred frames.
//!
//! A reply handler that cannot emit a frame within the peer's current
//! window parks the frame bytes in a pool slot and drains it on the next
//! WINDOW. The pool hands out at most `slot_count` slots; exhaustion
//! returns `None` and the caller decides whether the frame is droppable.

use tracing::{debug, warn};

/// Handle to an acquired pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(usize);

/// Pool of pre-allocated byte buffers.
pub struct BufferPool {
    slot_capacity: usize,
    slots: Vec<Vec<u8>>,
    free: Vec<usize>,
}

impl BufferPool {
    #[must_use]
    pub fn new(slot_count: usize, slot_capacity: usize) -> Self {
        Self {
            slot_capacity,
            slots: (0..slot_count)
                .map(|_| Vec::with_capacity(slot_capacity))
                .collect(),
            free: (0..slot_count).rev().collect(),
        }
    }

    /// Acquire an empty slot for the given stream, or `None` when the pool
    /// is exhausted.
    pub fn acquire(&mut self, stream_id: u64) -> Option<SlotId> {
        match self.free.pop() {
            Some(index) => {
                self.slots[index].clear();
                debug!(stream_id = stream_id, slot = index, "Pool slot acquired");
                Some(SlotId(index))
            }
            None => {
                warn!(
                    stream_id = stream_id,
                    slot_count = self.slots.len(),
                    "Buffer pool exhausted"
                );
                None
            }
        }
    }

    /// Buffer backing an acquired slot.
    pub fn buffer_mut(&mut self, slot: SlotId) -> &mut Vec<u8> {
        &mut self.slots[slot.0]
    }

    /// Return a slot to the pool.
    pub fn release(&mut self, slot: SlotId) {
        debug_assert!(
            !self.free.contains(&slot.0),
            "pool slot released while already free"
        );
        self.slots[slot.0].clear();
        self.free.push(slot.0);
        debug!(slot = slot.0, "Pool slot released");
    }

    #[must_use]
    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    /// Number of slots currently acquired.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_cycle() {
        let mut pool = BufferPool::new(2, 64);
        let a = pool.acquire(1).unwrap();
        let b = pool.acquire(3).unwrap();
        assert_eq!(pool.in_use(), 2);
        assert!(pool.acquire(5).is_none());

        pool.buffer_mut(a).extend_from_slice(b"id:9\n\n");
        assert_eq!(pool.buffer_mut(a).as_slice(), b"id:9\n\n");

        pool.release(a);
        assert_eq!(pool.in_use(), 1);
        let c = pool.acquire(7).unwrap();
        assert!(pool.buffer_mut(c).is_empty());
        pool.release(b);
        pool.release(c);
        assert_eq!(pool.in_use(), 0);
    }
}
