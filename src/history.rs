// src/history.rs
use std::collections::VecDeque;

/// Fixed-capacity FIFO; pushing into a full buffer evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// The `n` most recent entries in arrival order, or `None` if fewer are buffered.
    pub fn latest(&self, n: usize) -> Option<Vec<&T>> {
        if n > self.items.len() {
            return None;
        }
        Some(self.items.iter().skip(self.items.len() - n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut history = BoundedHistory::new(3);
        for i in 0..5 {
            history.push(i);
        }
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_latest_window() {
        let mut history = BoundedHistory::new(4);
        history.push('a');
        assert!(history.latest(2).is_none());
        history.push('b');
        history.push('c');
        assert_eq!(history.latest(2).unwrap(), vec![&'b', &'c']);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut history = BoundedHistory::new(0);
        history.push(1);
        assert!(history.is_empty());
    }
}
