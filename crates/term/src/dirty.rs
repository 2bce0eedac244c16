// Chunk: docs/chunks/display_buffer - Display buffer, viewport and reflow

//! Dirty-row tracking.
//!
//! The dirty set is a conservative over-approximation: a changed cell is
//! always in a dirty row, rows that did not change may be reported anyway.
//! The renderer takes and clears the whole set in one call.

use std::collections::BTreeSet;

/// Rows changed since the renderer last looked.
#[derive(Debug, Default)]
pub struct DirtyRows {
    rows: BTreeSet<usize>,
    all: bool,
}

impl DirtyRows {
    pub fn new() -> Self {
        DirtyRows::default()
    }

    pub fn mark(&mut self, row: usize) {
        if !self.all {
            self.rows.insert(row);
        }
    }

    pub fn mark_range(&mut self, rows: std::ops::Range<usize>) {
        if !self.all {
            for row in rows {
                self.rows.insert(row);
            }
        }
    }

    pub fn mark_all(&mut self) {
        self.all = true;
        self.rows.clear();
    }

    pub fn is_clean(&self) -> bool {
        !self.all && self.rows.is_empty()
    }

    /// Returns and clears the set. `(rows, all_dirty)`.
    pub fn take(&mut self) -> (BTreeSet<usize>, bool) {
        let all = self.all;
        self.all = false;
        (std::mem::take(&mut self.rows), all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_take() {
        let mut dirty = DirtyRows::new();
        dirty.mark(3);
        dirty.mark(1);
        dirty.mark(3);

        let (rows, all) = dirty.take();
        assert!(!all);
        assert_eq!(rows.into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert!(dirty.is_clean());
    }

    #[test]
    fn test_mark_all_wins() {
        let mut dirty = DirtyRows::new();
        dirty.mark(1);
        dirty.mark_all();
        dirty.mark(2);

        let (rows, all) = dirty.take();
        assert!(all);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_mark_range() {
        let mut dirty = DirtyRows::new();
        dirty.mark_range(2..5);
        let (rows, _) = dirty.take();
        assert_eq!(rows.into_iter().collect::<Vec<_>>(), vec![2, 3, 4]);
    }
}
