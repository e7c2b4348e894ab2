//! HNSW graph construction (Malkov & Yashunin insertion algorithm).
//!
//! Nodes are inserted one at a time. Each insertion draws a level, descends
//! greedily from the entry point to that level, then links the node on every
//! layer it occupies using an `ef_construction` beam search and the configured
//! neighbor selection rule. Reverse links that overflow their bound are
//! re-selected with the same rule.

use rand::Rng;

use crate::ann::topk::Candidate;
use crate::error::{check_finite, AnnError, Result};
use crate::hnsw::graph::{GraphNode, HnswIndex, Links, NeighborSelection, MAX_LEVEL};

impl HnswIndex {
    /// Insert a vector and return its ordinal.
    ///
    /// Ordinals are assigned densely in insertion order starting at 0.
    pub fn add(&mut self, vector: &[f32]) -> Result<u32> {
        if vector.len() != self.dimension {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }
        check_finite(vector, self.nodes.len())?;
        let id = u32::try_from(self.nodes.len()).map_err(|_| {
            AnnError::InvalidParameter("index is full (u32 ordinals exhausted)".to_string())
        })?;

        let level = self.draw_level();
        self.vectors.extend_from_slice(vector);
        self.nodes.push(GraphNode::new(level));

        let Some(entry_point) = self.entry_point else {
            self.entry_point = Some(id);
            self.max_level = level;
            return Ok(id);
        };

        self.link_new_node(id, level as usize, entry_point);

        if level > self.max_level {
            self.entry_point = Some(id);
            self.max_level = level;
        }
        Ok(id)
    }

    /// Insert every row of a contiguous `n * dimension` buffer.
    pub fn add_all(&mut self, vectors: &[f32]) -> Result<()> {
        if vectors.len() % self.dimension != 0 {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension,
                found: vectors.len() % self.dimension,
            });
        }
        for row in vectors.chunks_exact(self.dimension) {
            self.add(row)?;
        }
        Ok(())
    }

    /// Draw a level from the geometric distribution `floor(-ln(U) * level_mult)`.
    fn draw_level(&mut self) -> u8 {
        // random() is in [0, 1); flip it so ln() never sees 0.
        let uniform = 1.0 - self.level_rng.random::<f64>();
        let level = (-uniform.ln() * self.params.level_mult).floor();
        if level >= MAX_LEVEL as f64 {
            MAX_LEVEL
        } else {
            level as u8
        }
    }

    fn link_new_node(&mut self, id: u32, level: usize, entry_point: u32) {
        // Copy so the graph can be mutated while the query is alive.
        let query = self.get_vector(id).to_vec();
        let top = self.max_level();

        let mut nearest = Candidate {
            id: entry_point,
            distance: self.distance_to(&query, entry_point),
        };

        // 1) Above the node's own level, only refine the entry point (ef = 1).
        for layer in ((level + 1)..=top).rev() {
            nearest = self.greedy_closest(&query, nearest, layer);
        }

        // 2) On every shared layer, beam search and connect.
        for layer in (0..=level.min(top)).rev() {
            let mut found =
                self.search_layer(&query, nearest, layer, self.params.ef_construction);
            found.retain(|c| c.id != id);

            if let Some(best) = found.first() {
                nearest = *best;
            }

            let selected = self.select_neighbors(&found, self.params.max_links(layer), false);
            self.nodes[id as usize].links[layer] = selected.iter().copied().collect();

            for &neighbor in &selected {
                self.add_reverse_link(neighbor, id, layer);
            }
        }
    }

    /// Add `new_id` to `node`'s list on `layer`, shrinking the list back to its
    /// bound with the selection rule when it overflows.
    fn add_reverse_link(&mut self, node: u32, new_id: u32, layer: usize) {
        if node == new_id {
            return;
        }
        let bound = self.params.max_links(layer);
        let links = &self.nodes[node as usize].links[layer];
        if links.contains(&new_id) {
            return;
        }
        if links.len() < bound {
            self.nodes[node as usize].links[layer].push(new_id);
            return;
        }

        let mut candidates: Vec<Candidate> = links
            .iter()
            .copied()
            .chain(std::iter::once(new_id))
            .map(|other| Candidate {
                id: other,
                distance: self.distance_between(node, other),
            })
            .collect();
        candidates.sort_unstable();

        let kept = self.select_neighbors(&candidates, bound, true);
        self.nodes[node as usize].links[layer] = kept.into_iter().collect();
    }

    /// Pick at most `bound` neighbors from `candidates` (sorted nearest first).
    ///
    /// `keep_pruned` lets candidates rejected by the heuristic fill free slots.
    /// It is used when shrinking an existing list, never for a new node: filling
    /// new lists with redundant neighbors floods their reverse links and
    /// crowds the useful edges out of other lists.
    pub(crate) fn select_neighbors(
        &self,
        candidates: &[Candidate],
        bound: usize,
        keep_pruned: bool,
    ) -> Links {
        match self.params.neighbor_selection {
            NeighborSelection::Simple => candidates.iter().take(bound).map(|c| c.id).collect(),
            NeighborSelection::Heuristic => {
                self.select_neighbors_heuristic(candidates, bound, keep_pruned)
            }
        }
    }

    /// Relative neighborhood diversification.
    ///
    /// Candidate `c` is dropped if some kept `s` is strictly closer to it than
    /// the query is: `c` sits "behind" a neighbor that already covers its
    /// direction. Ties are kept, so exact duplicates still link to each other.
    fn select_neighbors_heuristic(
        &self,
        candidates: &[Candidate],
        bound: usize,
        keep_pruned: bool,
    ) -> Links {
        let mut selected: Links = Links::new();
        if bound == 0 {
            return selected;
        }
        let mut pruned: Vec<u32> = Vec::new();

        for candidate in candidates {
            if selected.len() >= bound {
                break;
            }
            let diverse = selected
                .iter()
                .all(|&kept| candidate.distance <= self.distance_between(kept, candidate.id));
            if diverse {
                selected.push(candidate.id);
            } else if keep_pruned {
                pruned.push(candidate.id);
            }
        }

        for id in pruned {
            if selected.len() >= bound {
                break;
            }
            selected.push(id);
        }

        selected
    }
}
