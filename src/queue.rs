use std::collections::VecDeque;
use std::sync::Mutex;

/// Mutex-guarded FIFO.
///
/// All operations are non-blocking best-effort snapshots; waiting for an item
/// is layered on top by the pool with a condition variable. FIFO order holds
/// among pushed items, concurrent pushers interleave in lock-acquisition
/// order, and no item is ever lost or duplicated.
pub struct SynchronizedQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> SynchronizedQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends to the tail. Always succeeds.
    pub fn push(&self, item: T) {
        self.inner.lock().unwrap().push_back(item);
    }

    /// Removes and returns the head, if any.
    pub fn pop(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

impl<T> Default for SynchronizedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
