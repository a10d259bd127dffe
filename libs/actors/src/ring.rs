//! Bounded history buffer
//!
//! Keeps the most recent `capacity` elements; pushing into a full buffer
//! evicts the oldest one. Safe to share between threads, e.g. as a trace of
//! the last messages an actor handled.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Thread-safe ring buffer of the newest `capacity` elements
#[derive(Debug)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> RingBuffer<T> {
    /// Creates a new buffer.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append `item`, returning the evicted element if the buffer was full
    pub fn push(&self, item: T) -> Option<T> {
        let mut items = self.items.lock();
        let evicted = if items.len() == self.capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove and return every element, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy of the contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }

    /// Most recently pushed element
    pub fn latest(&self) -> Option<T> {
        self.items.lock().back().cloned()
    }
}
