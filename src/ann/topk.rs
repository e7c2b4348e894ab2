//! Bounded top-k selection shared by every index.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A scored vector ordinal.
///
/// Ordered by distance, then by ordinal, so that equal distances resolve to the
/// earlier inserted vector and results are deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) id: u32,
    pub(crate) distance: f32,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // total_cmp: NaN-safe IEEE 754 total order
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Keeps the `k` smallest candidates pushed into it.
pub(crate) struct TopK {
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl TopK {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, id: u32, distance: f32) {
        if self.k == 0 {
            return;
        }
        let candidate = Candidate { id, distance };
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if self.heap.peek().is_some_and(|worst| candidate < *worst) {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    /// Results sorted nearest first.
    pub(crate) fn into_sorted(self) -> Vec<(u32, f32)> {
        let mut out = self.heap.into_vec();
        out.sort_unstable();
        out.into_iter().map(|c| (c.id, c.distance)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_smallest_k_in_order() {
        let mut top = TopK::new(3);
        for (id, d) in [(0, 5.0), (1, 1.0), (2, 4.0), (3, 0.5), (4, 3.0)] {
            top.push(id, d);
        }
        assert_eq!(top.into_sorted(), vec![(3, 0.5), (1, 1.0), (4, 3.0)]);
    }

    #[test]
    fn ties_prefer_lower_ordinal() {
        let mut top = TopK::new(2);
        for id in [4, 2, 9, 1] {
            top.push(id, 1.0);
        }
        assert_eq!(top.into_sorted(), vec![(1, 1.0), (2, 1.0)]);
    }

    #[test]
    fn zero_k_keeps_nothing() {
        let mut top = TopK::new(0);
        top.push(0, 0.0);
        assert!(top.into_sorted().is_empty());
    }
}
