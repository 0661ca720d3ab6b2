//! Free-slot index strategies.
//!
//! One contract, two implementations. `take_lowest` must always return the
//! smallest free slot index so the nearest-to-entrance policy is
//! deterministic regardless of release order.

use std::collections::BTreeSet;

/// Index over the free slots of a pool.
///
/// The pool calls `open` exactly once, then alternates `take_lowest` and
/// `put_back` under its write lock. Implementations never see a slot index
/// outside `[0, capacity)` once opened.
pub trait FreeIndex: Send + Sync {
    /// Size the index for `capacity` slots, all free.
    fn open(&mut self, capacity: usize);

    /// Remove and return the lowest free slot index, or `None` when full.
    fn take_lowest(&mut self) -> Option<usize>;

    /// Return a previously taken slot index to the free set.
    fn put_back(&mut self, index: usize);

    /// Number of currently free slots.
    fn free_count(&self) -> usize;
}

/// Ordered-set free index: `BTreeSet` keeps the lowest slot at the front,
/// so take/put are O(log n).
#[derive(Debug, Default)]
pub struct OrderedFreeIndex {
    free: BTreeSet<usize>,
}

impl OrderedFreeIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FreeIndex for OrderedFreeIndex {
    fn open(&mut self, capacity: usize) {
        self.free = (0..capacity).collect();
    }

    fn take_lowest(&mut self) -> Option<usize> {
        self.free.pop_first()
    }

    fn put_back(&mut self, index: usize) {
        let inserted = self.free.insert(index);
        debug_assert!(inserted, "slot {index} put back while already free");
    }

    fn free_count(&self) -> usize {
        self.free.len()
    }
}

/// Linear-scan free index: a plain occupancy bitmap, scanned front to back.
/// O(n) per allocation; the naive baseline the ordered index replaces.
#[derive(Debug, Default)]
pub struct ScanFreeIndex {
    occupied: Vec<bool>,
    free: usize,
}

impl ScanFreeIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FreeIndex for ScanFreeIndex {
    fn open(&mut self, capacity: usize) {
        self.occupied = vec![false; capacity];
        self.free = capacity;
    }

    fn take_lowest(&mut self) -> Option<usize> {
        let index = self.occupied.iter().position(|taken| !taken)?;
        self.occupied[index] = true;
        self.free -= 1;
        Some(index)
    }

    fn put_back(&mut self, index: usize) {
        debug_assert!(self.occupied[index], "slot {index} put back while already free");
        if self.occupied[index] {
            self.occupied[index] = false;
            self.free += 1;
        }
    }

    fn free_count(&self) -> usize {
        self.free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both() -> [Box<dyn FreeIndex>; 2] {
        [
            Box::new(OrderedFreeIndex::new()),
            Box::new(ScanFreeIndex::new()),
        ]
    }

    #[test]
    fn take_lowest_is_ordered() {
        for mut index in both() {
            index.open(3);
            assert_eq!(index.take_lowest(), Some(0));
            assert_eq!(index.take_lowest(), Some(1));
            assert_eq!(index.take_lowest(), Some(2));
            assert_eq!(index.take_lowest(), None);
        }
    }

    #[test]
    fn put_back_restores_lowest_first() {
        for mut index in both() {
            index.open(3);
            index.take_lowest();
            index.take_lowest();
            index.take_lowest();

            index.put_back(2);
            index.put_back(0);

            assert_eq!(index.free_count(), 2);
            assert_eq!(index.take_lowest(), Some(0));
            assert_eq!(index.take_lowest(), Some(2));
        }
    }

    #[test]
    fn empty_before_open() {
        for mut index in both() {
            assert_eq!(index.free_count(), 0);
            assert_eq!(index.take_lowest(), None);
        }
    }

    #[test]
    fn strategies_agree_on_interleaved_sequence() {
        let mut ordered = OrderedFreeIndex::new();
        let mut scan = ScanFreeIndex::new();
        ordered.open(5);
        scan.open(5);

        // take 4, put back out of order, take until exhausted
        let script: &[Option<usize>] = &[
            None,
            None,
            None,
            None,
            Some(2),
            Some(0),
            None,
            None,
            None,
            None,
            None,
        ];

        for step in script {
            match step {
                Some(index) => {
                    ordered.put_back(*index);
                    scan.put_back(*index);
                }
                None => {
                    assert_eq!(ordered.take_lowest(), scan.take_lowest());
                }
            }
            assert_eq!(ordered.free_count(), scan.free_count());
        }
    }
}
