//! Bounded FIFO of headers waiting for confirmation

use std::collections::VecDeque;

/// Returned by [`RollbackWindow::push`] when the window is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rollback window is full (capacity {capacity})")]
pub struct WindowFull {
    pub capacity: usize,
}

/// Holds up to `capacity` entries in arrival order, oldest at the front
#[derive(Debug, Clone)]
pub struct RollbackWindow<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> RollbackWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append, refusing when full
    pub fn push(&mut self, entry: T) -> Result<(), WindowFull> {
        if self.is_full() {
            return Err(WindowFull {
                capacity: self.capacity,
            });
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Remove the oldest
    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    /// The oldest, left in place
    pub fn peek(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Position of the first entry, oldest first, matching `predicate`
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<usize> {
        self.entries.iter().position(predicate)
    }

    /// Keep only the first `count` entries
    pub fn truncate_to(&mut self, count: usize) {
        self.entries.truncate(count);
    }

    /// Drop entries at positions `index` and beyond
    pub fn clear_from(&mut self, index: usize) {
        self.entries.truncate(index);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T: Clone> RollbackWindow<T> {
    /// Snapshot, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}
