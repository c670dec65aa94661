//! Fixed-capacity FIFO handing deferred calls from the real-time thread to the
//! async worker.
//!
//! Slots are allocated once at construction and never resized. The producer
//! only holds the mutex for the duration of a slot write; the consumer sleeps
//! on the condition variable while the queue is empty.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Capacity of the deferred call queue.
pub const MAX_ASYNC_CALLS: usize = 256;

/// Returned by [`CallQueue::push`] when every slot is occupied. Carries the
/// rejected item back to the caller.
pub struct QueueFull<T>(pub T);

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("call queue is full")
    }
}

impl<T> std::error::Error for QueueFull<T> {}

struct Ring<T> {
    slots: Box<[Option<T>]>,
    read_pos: usize,
    len: usize,
    closed: bool,
}

impl<T> Ring<T> {
    fn write(&mut self, item: T) -> Result<usize, QueueFull<T>> {
        if self.len == self.slots.len() {
            return Err(QueueFull(item));
        }
        let write_pos = (self.read_pos + self.len) % self.slots.len();
        self.slots[write_pos] = Some(item);
        self.len += 1;
        Ok(self.len)
    }

    fn read(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.read_pos].take();
        self.read_pos = (self.read_pos + 1) % self.slots.len();
        self.len -= 1;
        item
    }
}

/// Bounded single-producer/single-consumer queue with a blocking pop.
pub struct CallQueue<T> {
    ring: Mutex<Ring<T>>,
    ready: Condvar,
}

impl<T> CallQueue<T> {
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "call queue capacity must be non-zero");
        let slots = (0..capacity).map(|_| None).collect();
        Self {
            ring: Mutex::new(Ring {
                slots,
                read_pos: 0,
                len: 0,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        // Ring invariants hold between statements, so a poisoned lock is still usable
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Append an item and wake the consumer. Never blocks on the consumer.
    /// Returns the queue length including the new item.
    pub fn push(&self, item: T) -> Result<usize, QueueFull<T>> {
        let len = self.lock().write(item)?;
        self.ready.notify_one();
        Ok(len)
    }

    /// Pop without waiting. Returns `None` when empty or closed.
    pub fn try_pop(&self) -> Option<T> {
        let mut ring = self.lock();
        if ring.closed {
            return None;
        }
        ring.read()
    }

    /// Pop the oldest item, sleeping while the queue is empty.
    /// Returns `None` once the queue has been closed, even if items remain.
    pub fn wait_pop(&self) -> Option<T> {
        let mut ring = self.lock();
        loop {
            if ring.closed {
                return None;
            }
            if let Some(item) = ring.read() {
                return Some(item);
            }
            ring = self
                .ready
                .wait(ring)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Mark the queue closed and wake the consumer. Items still queued are
    /// dropped along with the queue.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }
}
