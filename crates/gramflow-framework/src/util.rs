//! Small shared building blocks.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A copy-on-write list.
///
/// Writers clone the vector and swap the `Arc`; readers take a snapshot
/// (a pointer copy) and release the lock immediately, so a snapshot can be
/// iterated across `.await` points while registration continues.
pub struct CowList<T> {
    items: RwLock<Arc<Vec<T>>>,
}

impl<T> Default for CowList<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Arc::new(Vec::new())),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CowList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.read().iter()).finish()
    }
}

impl<T: Clone> CowList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item.
    pub fn push(&self, item: T) {
        let mut guard = self.items.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(item);
        *guard = Arc::new(next);
    }

    /// Removes every item matching `pred`, returning how many were removed.
    pub fn retain(&self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let mut guard = self.items.write();
        let before = guard.len();
        let next: Vec<T> = guard.iter().filter(|item| pred(item)).cloned().collect();
        let removed = before - next.len();
        if removed > 0 {
            *guard = Arc::new(next);
        }
        removed
    }

    /// Removes every item.
    pub fn clear(&self) {
        *self.items.write() = Arc::new(Vec::new());
    }

    /// Current contents.
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.items.read().clone()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}
