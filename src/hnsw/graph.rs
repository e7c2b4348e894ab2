//! HNSW graph storage and parameters.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::distance::DistanceMetric;
use crate::error::{AnnError, Result};

/// Highest layer a node can be assigned to.
pub(crate) const MAX_LEVEL: u8 = 16;

/// Neighbor list of one node on one layer.
pub(crate) type Links = SmallVec<[u32; 16]>;

/// How a node picks its neighbors from the construction candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NeighborSelection {
    /// Relative neighborhood diversification.
    ///
    /// Candidates are visited nearest first and candidate `c` is kept only if no
    /// neighbor kept so far is strictly closer to it than the inserted node is.
    /// When an overflowing list is shrunk, slots left free are filled with the
    /// nearest pruned candidates.
    #[default]
    Heuristic,
    /// Plain top-M by distance.
    Simple,
}

/// HNSW construction and search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Maximum links per node on layers above 0 ("links per vector").
    pub m: usize,
    /// Maximum links per node on layer 0.
    pub m_max0: usize,
    /// Level normalization factor, `1 / ln(m)` by default.
    pub level_mult: f64,
    /// Beam width while inserting.
    pub ef_construction: usize,
    /// Beam width while searching. Can be changed after construction.
    pub ef_search: usize,
    /// Metric used both to build and to search the graph.
    pub metric: DistanceMetric,
    /// Neighbor selection rule.
    pub neighbor_selection: NeighborSelection,
    /// Seed for the level generator. `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl HnswParams {
    /// Parameters for `m` links per vector, with `2*m` links on the base layer.
    pub fn with_m(m: usize) -> Self {
        Self {
            m,
            m_max0: m.saturating_mul(2),
            level_mult: level_mult_for(m),
            ef_construction: 40,
            ef_search: 16,
            metric: DistanceMetric::L2,
            neighbor_selection: NeighborSelection::Heuristic,
            seed: None,
        }
    }

    /// Link bound on `layer`.
    #[inline]
    pub fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.m < 2 {
            return Err(AnnError::InvalidParameter(format!(
                "links per vector must be at least 2, got {}",
                self.m
            )));
        }
        if self.m_max0 < self.m {
            return Err(AnnError::InvalidParameter(format!(
                "base layer bound {} is smaller than links per vector {}",
                self.m_max0, self.m
            )));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(AnnError::InvalidParameter(
                "ef_construction and ef_search must be positive".to_string(),
            ));
        }
        if !(self.level_mult.is_finite() && self.level_mult > 0.0) {
            return Err(AnnError::InvalidParameter(format!(
                "level multiplier must be positive, got {}",
                self.level_mult
            )));
        }
        Ok(())
    }
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::with_m(16)
    }
}

fn level_mult_for(m: usize) -> f64 {
    1.0 / (m.max(2) as f64).ln()
}

/// One inserted vector in the graph arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GraphNode {
    /// `links[l]` holds the neighbors on layer `l`, for `l` in `0..=level`.
    pub(crate) links: Vec<Links>,
}

impl GraphNode {
    pub(crate) fn new(level: u8) -> Self {
        Self {
            links: vec![Links::new(); level as usize + 1],
        }
    }

    #[inline]
    pub(crate) fn level(&self) -> usize {
        self.links.len() - 1
    }

    #[inline]
    pub(crate) fn neighbors(&self, layer: usize) -> &[u32] {
        self.links.get(layer).map_or(&[], |l| l.as_slice())
    }
}

/// Hierarchical navigable small world index.
///
/// Nodes live in an arena indexed by insertion ordinal and edges are stored as
/// ordinals, so the whole graph is a handful of flat vectors. Vectors are kept
/// contiguously (`vectors[id * dimension..][..dimension]`).
///
/// Insertion takes `&mut self`; search takes `&self` and keeps all scratch
/// state on the stack of the call, so a built index can be queried from many
/// threads at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswIndex {
    pub(crate) vectors: Vec<f32>,
    pub(crate) dimension: usize,
    pub(crate) nodes: Vec<GraphNode>,
    pub(crate) params: HnswParams,
    /// Node searches start from; always one of the nodes on `max_level`.
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_level: u8,
    #[serde(skip, default = "unseeded_rng")]
    pub(crate) level_rng: StdRng,
}

fn unseeded_rng() -> StdRng {
    StdRng::from_os_rng()
}

impl HnswIndex {
    /// Create an empty index with `m` links per vector and default beam widths.
    pub fn new(dimension: usize, m: usize) -> Result<Self> {
        Self::with_params(dimension, HnswParams::with_m(m))
    }

    /// Create an empty index with explicit parameters.
    pub fn with_params(dimension: usize, params: HnswParams) -> Result<Self> {
        if dimension == 0 {
            return Err(AnnError::InvalidParameter(
                "dimension must be positive".to_string(),
            ));
        }
        params.validate()?;

        let level_rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => unseeded_rng(),
        };

        Ok(Self {
            vectors: Vec::new(),
            dimension,
            nodes: Vec::new(),
            params,
            entry_point: None,
            max_level: 0,
            level_rng,
        })
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Change the search beam width. Does not touch the graph.
    pub fn set_ef_search(&mut self, ef_search: usize) {
        self.params.ef_search = ef_search.max(1);
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    /// Top layer of the graph (the entry point's level).
    pub fn max_level(&self) -> usize {
        self.max_level as usize
    }

    /// Top layer of node `id`.
    pub fn level(&self, id: u32) -> Option<usize> {
        self.nodes.get(id as usize).map(GraphNode::level)
    }

    /// Neighbors of `id` on `layer`. Empty when the node does not reach that layer.
    pub fn neighbors(&self, id: u32, layer: usize) -> &[u32] {
        self.nodes
            .get(id as usize)
            .map_or(&[], |node| node.neighbors(layer))
    }

    /// Stored vector for `id`.
    pub fn vector(&self, id: u32) -> Option<&[f32]> {
        ((id as usize) < self.nodes.len()).then(|| self.get_vector(id))
    }

    #[inline]
    pub(crate) fn get_vector(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    #[inline]
    pub(crate) fn distance_to(&self, query: &[f32], id: u32) -> f32 {
        self.params.metric.distance(query, self.get_vector(id))
    }

    #[inline]
    pub(crate) fn distance_between(&self, a: u32, b: u32) -> f32 {
        self.params
            .metric
            .distance(self.get_vector(a), self.get_vector(b))
    }

    /// Approximate heap footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        let links: usize = self
            .nodes
            .iter()
            .flat_map(|n| n.links.iter())
            .map(|l| {
                let heap = if l.spilled() {
                    l.capacity() * std::mem::size_of::<u32>()
                } else {
                    0
                };
                std::mem::size_of::<Links>() + heap
            })
            .sum();
        self.vectors.len() * std::mem::size_of::<f32>() + links
    }

    /// Summary of the graph shape.
    pub fn graph_stats(&self) -> GraphStats {
        let mut nodes_per_layer = vec![0usize; self.max_level() + 1];
        let mut edges_per_layer = vec![0usize; self.max_level() + 1];
        for node in &self.nodes {
            for (layer, links) in node.links.iter().enumerate() {
                nodes_per_layer[layer] += 1;
                edges_per_layer[layer] += links.len();
            }
        }
        GraphStats {
            nodes_per_layer,
            edges_per_layer,
        }
    }
}

/// Per-layer node and edge counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes_per_layer: Vec<usize>,
    pub edges_per_layer: Vec<usize>,
}

impl GraphStats {
    /// Mean out-degree on `layer`, 0 for an empty layer.
    pub fn mean_degree(&self, layer: usize) -> f64 {
        match (
            self.nodes_per_layer.get(layer),
            self.edges_per_layer.get(layer),
        ) {
            (Some(&n), Some(&e)) if n > 0 => e as f64 / n as f64,
            _ => 0.0,
        }
    }
}
