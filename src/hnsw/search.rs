//! HNSW search: greedy descent through the upper layers, beam search on layer 0.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::ann::topk::Candidate;
use crate::error::{AnnError, Result};
use crate::hnsw::graph::HnswIndex;

impl HnswIndex {
    /// Search for the `k` nearest neighbors with the configured `ef_search`.
    ///
    /// Returns `(ordinal, distance)` pairs sorted nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        self.search_with_ef(query, k, self.params.ef_search)
    }

    /// Search with an explicit beam width. The effective width is `max(ef, k)`.
    pub fn search_with_ef(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<(u32, f32)>> {
        if query.len() != self.dimension {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }
        let Some(entry_point) = self.entry_point else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut nearest = Candidate {
            id: entry_point,
            distance: self.distance_to(query, entry_point),
        };
        for layer in (1..=self.max_level()).rev() {
            nearest = self.greedy_closest(query, nearest, layer);
        }

        let mut found = self.search_layer(query, nearest, 0, ef.max(k));
        found.truncate(k);
        Ok(found.into_iter().map(|c| (c.id, c.distance)).collect())
    }

    /// Walk `layer` greedily from `start`, always moving to a strictly closer
    /// neighbor, until no neighbor improves.
    pub(crate) fn greedy_closest(&self, query: &[f32], start: Candidate, layer: usize) -> Candidate {
        let mut best = start;
        loop {
            let mut improved = false;
            for &neighbor in self.nodes[best.id as usize].neighbors(layer) {
                let candidate = Candidate {
                    id: neighbor,
                    distance: self.distance_to(query, neighbor),
                };
                if candidate < best {
                    best = candidate;
                    improved = true;
                }
            }
            if !improved {
                return best;
            }
        }
    }

    /// Beam search on a single layer.
    ///
    /// Keeps a min-heap of unexplored candidates and a max-heap of the `ef` best
    /// results; stops when the closest unexplored candidate is farther than the
    /// worst kept result and the result set is full. Output is sorted nearest first.
    pub(crate) fn search_layer(
        &self,
        query: &[f32],
        entry: Candidate,
        layer: usize,
        ef: usize,
    ) -> Vec<Candidate> {
        let ef = ef.max(1);
        let mut visited: HashSet<u32> = HashSet::with_capacity(ef * 4);
        let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(ef * 2);
        let mut results: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef + 1);

        visited.insert(entry.id);
        candidates.push(Reverse(entry));
        results.push(entry);

        while let Some(Reverse(current)) = candidates.pop() {
            if results.len() >= ef
                && results
                    .peek()
                    .is_some_and(|worst| current.distance > worst.distance)
            {
                break;
            }

            for &neighbor in self.nodes[current.id as usize].neighbors(layer) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let candidate = Candidate {
                    id: neighbor,
                    distance: self.distance_to(query, neighbor),
                };
                let admit = results.len() < ef
                    || results.peek().is_some_and(|worst| candidate < *worst);
                if admit {
                    candidates.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut output = results.into_vec();
        output.sort_unstable();
        output
    }
}
