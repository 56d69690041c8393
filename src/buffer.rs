use crate::error::{PipelineError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Slot storage guarded by the buffer's lock.
///
/// Slots `[write_cursor - count, write_cursor)` (mod capacity) hold the live
/// values, oldest first.
#[derive(Debug)]
struct Slots<T> {
    storage: Box<[Option<T>]>,
    write_cursor: usize,
    count: usize,
}

/// A fixed-capacity circular buffer that overwrites its oldest value when full.
///
/// `push` and `drain_all` take the same lock, so a push racing a drain lands
/// either entirely in that drain's output or entirely after it.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Mutex<Slots<T>>,
    capacity: usize,
    overwritten: AtomicU64,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer holding at most `capacity` values
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "ring buffer capacity must be positive".into(),
            ));
        }

        let storage = std::iter::repeat_with(|| None).take(capacity).collect();
        Ok(Self {
            slots: Mutex::new(Slots {
                storage,
                write_cursor: 0,
                count: 0,
            }),
            capacity,
            overwritten: AtomicU64::new(0),
        })
    }

    /// Store a value, replacing the oldest one if the buffer is full
    pub fn push(&self, item: T) {
        let mut slots = self.slots.lock();
        let cursor = slots.write_cursor;
        slots.storage[cursor] = Some(item);
        slots.write_cursor = (cursor + 1) % self.capacity;

        if slots.count == self.capacity {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        } else {
            slots.count += 1;
        }
    }

    /// Take every buffered value in insertion order and leave the buffer empty.
    ///
    /// Returns an empty vector when nothing is buffered.
    pub fn drain_all(&self) -> Vec<T> {
        let mut slots = self.slots.lock();
        let count = std::mem::take(&mut slots.count);
        if count == 0 {
            return Vec::new();
        }

        let start = (slots.write_cursor + self.capacity - count) % self.capacity;
        let mut drained = Vec::with_capacity(count);
        for offset in 0..count {
            let idx = (start + offset) % self.capacity;
            if let Some(item) = slots.storage[idx].take() {
                drained.push(item);
            }
        }
        drained
    }

    /// Configured capacity (not the fill level)
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// Number of values currently buffered
    pub fn len(&self) -> usize {
        self.slots.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Fill level as a percentage (0-100)
    pub fn utilization(&self) -> u32 {
        ((self.len() * 100) / self.capacity) as u32
    }

    /// Number of values lost to overwrite since creation
    pub fn overwritten_count(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}
