//! wordnn: batched approximate nearest neighbor search over word embeddings.
//!
//! Loads vectors in the word2vec text format, builds an index chosen by a
//! factory string, saves it, then answers top-K queries in bounded batches:
//!
//! - [`hnsw`]: hierarchical navigable small world graph (the default index)
//! - [`flat`]: exhaustive scan, exact
//! - [`ivf_pq`]: product quantization and inverted-file indexes
//! - [`ann`]: the shared [`AnnIndex`] contract and [`index_factory`]
//! - [`corpus`], [`runner`], [`pipeline`], [`config`]: the `nn` tool around them
//!
//! # Critical Nuances
//!
//! ## Distances, not similarities
//!
//! Every index returns *distances*, nearest first. `L2` is squared Euclidean,
//! `InnerProduct` is the negated dot product and `Cosine` is `1 - cos`, so a
//! result list is always sorted ascending whatever the metric.
//!
//! ## Approximate means approximate
//!
//! HNSW recall depends on `ef_search` and the graph degree. A query can miss a
//! true neighbor; that is a quality knob, not an error. Use `Flat` for ground
//! truth.
//!
//! ## Ordinals, not labels
//!
//! Indexes number vectors 0, 1, 2, ... in insertion order. Labels live in the
//! [`corpus::VectorCorpus`] and are joined back in by the runner.

pub mod ann;
pub mod config;
pub mod corpus;
pub mod distance;
pub mod error;
pub mod flat;
pub mod hnsw;
pub mod ivf_pq;
pub mod partitioning;
pub mod persistence;
pub mod pipeline;
pub mod runner;
pub mod simd;

// Re-exports
pub use ann::{index_factory, AnnIndex, AnyIndex, FactoryOptions, IndexStats};
pub use config::NnConfig;
pub use corpus::{VectorCorpus, VectorReader};
pub use distance::DistanceMetric;
pub use error::{AnnError, Result};
pub use runner::{BatchQueryRunner, RunStats};
