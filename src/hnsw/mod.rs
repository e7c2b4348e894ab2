//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor search.
//!
//! # Algorithm
//!
//! HNSW builds a multi-layer proximity graph:
//! - **Layer 0** holds every vector with up to `2*m` links each.
//! - **Upper layers** hold a geometrically shrinking subset (a node reaches layer
//!   `l` with probability `m^-l`) with up to `m` links, acting as long-range
//!   express lanes.
//! - **Search** starts at the entry point on the top layer, walks greedily down to
//!   layer 1, then runs a beam search of width `max(ef_search, k)` on layer 0.
//!
//! Construction inserts nodes one at a time with the same descent and links each
//! node using a diversity-aware neighbor heuristic; see [`NeighborSelection`].
//! [`HnswIndex::repair_connectivity`] (run by `AnnIndex::build`) then relinks any
//! node the shrink step left unreachable, so every layer is connected from the
//! entry point.
//!
//! # Usage
//!
//! ```rust
//! use wordnn::hnsw::{HnswIndex, HnswParams};
//!
//! # fn main() -> Result<(), wordnn::AnnError> {
//! let params = HnswParams {
//!     ef_construction: 64,
//!     ef_search: 32,
//!     seed: Some(7),
//!     ..HnswParams::with_m(8)
//! };
//! let mut index = HnswIndex::with_params(2, params)?;
//!
//! index.add(&[0.0, 0.0])?;
//! index.add(&[1.0, 0.0])?;
//! index.add(&[0.0, 1.0])?;
//!
//! let results = index.search(&[0.9, 0.1], 1)?;
//! assert_eq!(results[0].0, 1);
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - Malkov & Yashunin (2016): "Efficient and robust approximate nearest neighbor search
//!   using Hierarchical Navigable Small World graphs"

mod construction;
mod graph;
mod repair;
mod search;

pub use graph::{GraphStats, HnswIndex, HnswParams, NeighborSelection};
