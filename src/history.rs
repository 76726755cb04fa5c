use std::collections::VecDeque;

use log::debug;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Bounded undo/redo ring.
///
/// Holds entries in chronological order plus a cursor at the entry that is
/// currently shown. Pushing prunes everything after the cursor and evicts
/// the oldest entry when the ring is full.
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    entries: VecDeque<T>,
    position: usize,
    capacity: usize,
}

impl<T> HistoryRing<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            position: 0,
            capacity,
        }
    }

    pub fn push(&mut self, entry: T) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.position + 1);
        }
        self.entries.push_back(entry);
        self.position = self.entries.len() - 1;

        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.position -= 1;
        }
        debug!(
            "history push: position {} of {}",
            self.position,
            self.entries.len()
        );
    }

    /// Step back one entry; `None` when already at the oldest entry.
    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.position -= 1;
        self.entries.get(self.position)
    }

    /// Step forward one entry; `None` when already at the newest entry.
    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.position += 1;
        self.entries.get(self.position)
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.position + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.position)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.position = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T> Default for HistoryRing<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_with(capacity: usize, values: impl IntoIterator<Item = u32>) -> HistoryRing<u32> {
        let mut ring = HistoryRing::new(capacity);
        for v in values {
            ring.push(v);
        }
        ring
    }

    #[test]
    fn empty_ring_has_nothing_to_undo_or_redo() {
        let mut ring: HistoryRing<u32> = HistoryRing::default();
        assert!(ring.undo().is_none());
        assert!(ring.redo().is_none());
        assert_eq!(ring.capacity(), DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        for capacity in [1, 2, 5, 50] {
            let mut ring = HistoryRing::new(capacity);
            for n in 0..(capacity as u32 * 3) {
                ring.push(n);
                assert!(ring.len() <= capacity);
                assert!(ring.position() < ring.len());
                assert_eq!(ring.current(), Some(&n));
            }
        }
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut ring = ring_with(3, [1, 2, 3, 4]);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(ring.position(), 2);
        assert_eq!(ring.undo(), Some(&3));
        assert_eq!(ring.undo(), Some(&2));
        assert_eq!(ring.undo(), None);
    }

    #[test]
    fn push_after_undos_prunes_branch() {
        let mut ring = ring_with(50, [1, 2, 3, 4, 5]);
        let before = ring.len();
        ring.undo();
        ring.undo();
        ring.push(99);

        assert_eq!(ring.len(), before - 2 + 1);
        assert_eq!(ring.current(), Some(&99));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 99]);
        assert!(ring.redo().is_none());
    }

    #[test]
    fn undo_then_redo_returns_same_entry() {
        let mut ring = ring_with(50, [10, 20, 30]);
        assert_eq!(ring.undo(), Some(&20));
        assert_eq!(ring.redo(), Some(&30));
        assert_eq!(ring.redo(), None);
        assert_eq!(ring.current(), Some(&30));
    }

    #[test]
    fn single_entry_cannot_move() {
        let mut ring = ring_with(50, [7]);
        assert!(!ring.can_undo());
        assert!(!ring.can_redo());
        assert_eq!(ring.undo(), None);
        assert_eq!(ring.position(), 0);
    }

    #[test]
    fn reset_empties_ring() {
        let mut ring = ring_with(50, [1, 2, 3]);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.current(), None);
        ring.push(4);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.position(), 0);
    }
}
