//! Exhaustive (brute-force) index.
//!
//! Exact k-NN by scanning every stored vector. Used as the `Flat` factory key
//! and as ground truth when measuring recall.

use serde::{Deserialize, Serialize};

use crate::ann::topk::TopK;
use crate::distance::DistanceMetric;
use crate::error::{check_finite, AnnError, Result};

/// Flat index: stores raw vectors, searches by linear scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    pub(crate) vectors: Vec<f32>,
    pub(crate) dimension: usize,
    pub(crate) num_vectors: usize,
    pub(crate) metric: DistanceMetric,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Result<Self> {
        if dimension == 0 {
            return Err(AnnError::InvalidParameter(
                "dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            vectors: Vec::new(),
            dimension,
            num_vectors: 0,
            metric,
        })
    }

    /// Append a vector, returning its ordinal.
    pub fn add(&mut self, vector: &[f32]) -> Result<u32> {
        if vector.len() != self.dimension {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }
        check_finite(vector, self.num_vectors)?;
        let id = u32::try_from(self.num_vectors).map_err(|_| {
            AnnError::InvalidParameter("index is full (u32 ordinals exhausted)".to_string())
        })?;
        self.vectors.extend_from_slice(vector);
        self.num_vectors += 1;
        Ok(id)
    }

    /// Exact `k` nearest neighbors, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        if query.len() != self.dimension {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }
        let mut top = TopK::new(k);
        for (id, vector) in self.vectors.chunks_exact(self.dimension).enumerate() {
            top.push(id as u32, self.metric.distance(query, vector));
        }
        Ok(top.into_sorted())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.num_vectors
    }

    pub fn is_empty(&self) -> bool {
        self.num_vectors == 0
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_neighbors() {
        let mut index = FlatIndex::new(2, DistanceMetric::L2).unwrap();
        for v in [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]] {
            index.add(&v).unwrap();
        }
        let results = index.search(&[0.9, 0.8], 2).unwrap();
        assert_eq!(results[0].0, 3);
        assert!((results[0].1 - 0.05).abs() < 1e-6);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn inner_product_ranks_by_dot() {
        let mut index = FlatIndex::new(2, DistanceMetric::InnerProduct).unwrap();
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[5.0, 0.0]).unwrap();
        let results = index.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results, vec![(1, -5.0)]);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let mut index = FlatIndex::new(3, DistanceMetric::L2).unwrap();
        assert!(index.add(&[1.0]).is_err());
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn rejects_non_finite_vectors() {
        let mut index = FlatIndex::new(2, DistanceMetric::L2).unwrap();
        index.add(&[0.0, 1.0]).unwrap();
        for bad in [[f32::NAN, 0.0], [0.0, f32::INFINITY], [f32::NEG_INFINITY, 1.0]] {
            assert!(matches!(index.add(&bad), Err(AnnError::InvalidParameter(_))));
        }
        assert_eq!(index.len(), 1);
        assert_eq!(index.search(&[0.0, 1.0], 5).unwrap(), vec![(0, 0.0)]);
    }
}
