//! Connectivity check and repair for the HNSW layers.
//!
//! Insertion alone does not guarantee that every node stays reachable: when a
//! neighbor list overflows, the shrink step keeps the closest diverse links and
//! can drop the only edge leading into a region. Repair walks each layer
//! breadth-first from the entry point, recording the tree of first-discovery
//! edges, and attaches every orphan to its nearest reachable node.
//!
//! Tree edges are never evicted, so attaching one orphan cannot cut off a node
//! that was already reachable and a single pass per layer suffices.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::ann::topk::Candidate;
use crate::hnsw::graph::HnswIndex;

/// Parent marker for nodes the walk has not reached.
const UNREACHED: u32 = u32::MAX;

impl HnswIndex {
    /// Count nodes reachable from the entry point over `layer` edges.
    ///
    /// Returns `(reachable, orphans)` where orphans are nodes that occupy
    /// `layer` but cannot be reached on it.
    pub fn layer_connectivity(&self, layer: usize) -> (usize, usize) {
        let Some(entry_point) = self.entry_point else {
            return (0, 0);
        };
        if layer > self.max_level() {
            return (0, 0);
        }
        let parents = self.spanning_tree(entry_point, layer);
        let reachable = parents.iter().filter(|&&p| p != UNREACHED).count();
        let occupied = self.nodes.iter().filter(|n| n.level() >= layer).count();
        (reachable, occupied.saturating_sub(reachable))
    }

    /// Attach every node that cannot be reached from the entry point, on every
    /// layer. Returns the number of orphans attached.
    ///
    /// A connected graph is left untouched.
    pub fn repair_connectivity(&mut self) -> usize {
        let Some(entry_point) = self.entry_point else {
            return 0;
        };
        let mut attached = 0;
        for layer in (0..=self.max_level()).rev() {
            attached += self.repair_layer(entry_point, layer);
        }
        if attached > 0 {
            debug!(attached, "reconnected orphaned nodes");
        }
        attached
    }

    fn repair_layer(&mut self, entry_point: u32, layer: usize) -> usize {
        let mut parents = self.spanning_tree(entry_point, layer);
        let mut attached = 0;
        let mut stranded = 0;

        for orphan in 0..self.nodes.len() as u32 {
            if parents[orphan as usize] != UNREACHED || self.nodes[orphan as usize].level() < layer {
                continue;
            }
            let anchors = self.reachable_candidates(orphan, layer, &parents);
            let Some(anchor) = anchors
                .into_iter()
                .find(|&anchor| self.attach(anchor, orphan, layer, &parents))
            else {
                stranded += 1;
                continue;
            };

            // A way back out too, if the orphan has room.
            let links = &mut self.nodes[orphan as usize].links[layer];
            if links.len() < self.params.max_links(layer) && !links.contains(&anchor) {
                links.push(anchor);
            }
            parents[orphan as usize] = anchor;
            self.extend_tree(orphan, layer, &mut parents);
            attached += 1;
        }

        if stranded > 0 {
            warn!(layer, stranded, "nodes left unreachable: every nearby list is all tree edges");
        }
        attached
    }

    /// Reachable nodes near `orphan` on `layer`, nearest first.
    fn reachable_candidates(&self, orphan: u32, layer: usize, parents: &[u32]) -> Vec<u32> {
        let Some(entry_point) = self.entry_point else {
            return Vec::new();
        };
        let query = self.get_vector(orphan);
        let from_entry = Candidate {
            id: entry_point,
            distance: self.distance_to(query, entry_point),
        };
        let mut start = from_entry;
        for upper in ((layer + 1)..=self.max_level()).rev() {
            start = self.greedy_closest(query, start, upper);
        }
        // The descent can land in an unreachable region of this layer.
        if parents[start.id as usize] == UNREACHED {
            start = from_entry;
        }

        self.search_layer(query, start, layer, self.params.ef_construction)
            .into_iter()
            .map(|c| c.id)
            .filter(|&id| id != orphan && parents[id as usize] != UNREACHED)
            .collect()
    }

    /// Link `anchor -> orphan`, using a free slot or evicting the farthest
    /// link that is not a tree edge. Fails when every link is a tree edge.
    fn attach(&mut self, anchor: u32, orphan: u32, layer: usize, parents: &[u32]) -> bool {
        let links = &self.nodes[anchor as usize].links[layer];
        if links.contains(&orphan) {
            return true;
        }
        if links.len() < self.params.max_links(layer) {
            self.nodes[anchor as usize].links[layer].push(orphan);
            return true;
        }

        let victim = links
            .iter()
            .enumerate()
            .filter(|&(_, &other)| parents[other as usize] != anchor)
            .map(|(slot, &other)| (slot, other, self.distance_between(anchor, other)))
            .max_by(|a, b| a.2.total_cmp(&b.2).then(a.1.cmp(&b.1)))
            .map(|(slot, _, _)| slot);
        match victim {
            Some(slot) => {
                self.nodes[anchor as usize].links[layer][slot] = orphan;
                true
            }
            None => false,
        }
    }

    /// Breadth-first spanning tree from `root`: `parents[id]` is the node that
    /// first reached `id`, the root is its own parent.
    fn spanning_tree(&self, root: u32, layer: usize) -> Vec<u32> {
        let mut parents = vec![UNREACHED; self.nodes.len()];
        parents[root as usize] = root;
        self.extend_tree(root, layer, &mut parents);
        parents
    }

    fn extend_tree(&self, from: u32, layer: usize, parents: &mut [u32]) {
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            for &next in self.nodes[node as usize].neighbors(layer) {
                if parents[next as usize] == UNREACHED {
                    parents[next as usize] = node;
                    queue.push_back(next);
                }
            }
        }
    }
}
