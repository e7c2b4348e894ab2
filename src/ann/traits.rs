//! Unified trait for all index families.

use crate::error::Result;

/// Unified trait for all ANN index implementations.
///
/// Ordinals are assigned densely in insertion order; callers keep their own
/// ordinal → label mapping.
pub trait AnnIndex {
    /// Add a vector and return its ordinal.
    fn add(&mut self, vector: &[f32]) -> Result<u32>;

    /// Finish construction. Trains quantizers where the family has any; a no-op
    /// for graph and flat indexes. Idempotent.
    fn build(&mut self) -> Result<()>;

    /// Search for the `k` nearest neighbors, nearest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>>;

    /// Get vector dimension.
    fn dimension(&self) -> usize;

    /// Get number of vectors.
    fn num_vectors(&self) -> usize;

    /// Get index size in bytes (approximate).
    fn size_bytes(&self) -> usize;

    /// Get index statistics.
    fn stats(&self) -> IndexStats {
        IndexStats {
            num_vectors: self.num_vectors(),
            dimension: self.dimension(),
            size_bytes: self.size_bytes(),
            algorithm: self.algorithm(),
        }
    }

    /// Short family name used in logs.
    fn algorithm(&self) -> &'static str;
}

/// Statistics about an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub num_vectors: usize,
    pub dimension: usize,
    pub size_bytes: usize,
    pub algorithm: &'static str,
}

impl AnnIndex for crate::hnsw::HnswIndex {
    fn add(&mut self, vector: &[f32]) -> Result<u32> {
        self.add(vector)
    }

    fn build(&mut self) -> Result<()> {
        // Searchable after every insertion; build only restores connectivity.
        self.repair_connectivity();
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        self.search(query, k)
    }

    fn dimension(&self) -> usize {
        self.dimension()
    }

    fn num_vectors(&self) -> usize {
        self.len()
    }

    fn size_bytes(&self) -> usize {
        self.size_bytes()
    }

    fn algorithm(&self) -> &'static str {
        "HNSW"
    }
}

impl AnnIndex for crate::flat::FlatIndex {
    fn add(&mut self, vector: &[f32]) -> Result<u32> {
        self.add(vector)
    }

    fn build(&mut self) -> Result<()> {
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        self.search(query, k)
    }

    fn dimension(&self) -> usize {
        self.dimension()
    }

    fn num_vectors(&self) -> usize {
        self.len()
    }

    fn size_bytes(&self) -> usize {
        self.vectors.len() * std::mem::size_of::<f32>()
    }

    fn algorithm(&self) -> &'static str {
        "Flat"
    }
}

impl AnnIndex for crate::ivf_pq::PqIndex {
    fn add(&mut self, vector: &[f32]) -> Result<u32> {
        self.add(vector)
    }

    fn build(&mut self) -> Result<()> {
        self.build()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        self.search(query, k)
    }

    fn dimension(&self) -> usize {
        self.dimension()
    }

    fn num_vectors(&self) -> usize {
        self.len()
    }

    fn size_bytes(&self) -> usize {
        self.size_bytes()
    }

    fn algorithm(&self) -> &'static str {
        "PQ"
    }
}

impl AnnIndex for crate::ivf_pq::IvfIndex {
    fn add(&mut self, vector: &[f32]) -> Result<u32> {
        self.add(vector)
    }

    fn build(&mut self) -> Result<()> {
        self.build()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        self.search(query, k)
    }

    fn dimension(&self) -> usize {
        self.dimension()
    }

    fn num_vectors(&self) -> usize {
        self.len()
    }

    fn size_bytes(&self) -> usize {
        self.size_bytes()
    }

    fn algorithm(&self) -> &'static str {
        "IVF"
    }
}
