//! Inverted-file index (`IVF<n>,Flat` and `IVF<n>,PQ<m>`).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::pq::ProductQuantizer;
use crate::ann::topk::TopK;
use crate::distance::DistanceMetric;
use crate::error::{check_finite, AnnError, Result};
use crate::partitioning::KMeans;

/// IVF parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IvfParams {
    /// Number of inverted lists (k-means clusters)
    pub nlist: usize,

    /// Number of lists scanned per query
    pub nprobe: usize,

    pub metric: DistanceMetric,

    pub seed: Option<u64>,
}

impl Default for IvfParams {
    fn default() -> Self {
        Self {
            nlist: 1024,
            nprobe: 1,
            metric: DistanceMetric::L2,
            seed: None,
        }
    }
}

/// How vectors inside the lists are stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum IvfStorage {
    /// Raw vectors, exact distances within probed lists.
    Flat,
    /// PQ codes, ADC distances within probed lists.
    Pq(ProductQuantizer),
}

/// Inverted-file index.
///
/// Vectors are buffered until `build`, which trains the coarse quantizer, fills
/// the lists and (for PQ storage) trains and encodes. Adding after `build`
/// assigns the vector to its nearest list directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfIndex {
    pub(crate) vectors: Vec<f32>,
    pub(crate) dimension: usize,
    pub(crate) num_vectors: usize,
    params: IvfParams,
    storage: IvfStorage,
    built: bool,

    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<u32>>,

    // Flattened codes: [vector_0_codes, vector_1_codes, ...]
    codes: Vec<u8>,
}

impl IvfIndex {
    pub fn new(dimension: usize, params: IvfParams, storage: IvfStorage) -> Result<Self> {
        if dimension == 0 {
            return Err(AnnError::InvalidParameter(
                "dimension must be positive".to_string(),
            ));
        }
        if params.nlist == 0 {
            return Err(AnnError::InvalidParameter(
                "IVF list count must be positive".to_string(),
            ));
        }

        Ok(Self {
            vectors: Vec::new(),
            dimension,
            num_vectors: 0,
            params,
            storage,
            built: false,
            centroids: Vec::new(),
            lists: Vec::new(),
            codes: Vec::new(),
        })
    }

    pub fn params(&self) -> &IvfParams {
        &self.params
    }

    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.params.nprobe = nprobe.max(1);
    }

    /// Add a vector to the index, returning its ordinal.
    pub fn add(&mut self, vector: &[f32]) -> Result<u32> {
        self.check_dimension(vector)?;
        check_finite(vector, self.num_vectors)?;
        let id = u32::try_from(self.num_vectors).map_err(|_| {
            AnnError::InvalidParameter("index is full (u32 ordinals exhausted)".to_string())
        })?;

        if self.built {
            let (list, _) = self.nearest_list(vector);
            self.lists[list].push(id);
            match &self.storage {
                IvfStorage::Flat => self.vectors.extend_from_slice(vector),
                IvfStorage::Pq(pq) => {
                    let codes = pq.quantize(vector)?;
                    self.codes.extend_from_slice(&codes);
                }
            }
        } else {
            self.vectors.extend_from_slice(vector);
        }
        self.num_vectors += 1;
        Ok(id)
    }

    /// Build the index.
    pub fn build(&mut self) -> Result<()> {
        if self.built {
            return Ok(());
        }
        if self.num_vectors == 0 {
            return Err(AnnError::EmptyIndex);
        }

        let mut nlist = self.params.nlist;
        if nlist > self.num_vectors {
            warn!(
                requested = nlist,
                num_vectors = self.num_vectors,
                "IVF list count exceeds vector count; clamping"
            );
            nlist = self.num_vectors;
        }

        // Stage 1: coarse quantizer
        let mut kmeans = KMeans::new(self.dimension, nlist)?.with_seed(self.params.seed);
        kmeans.fit(&self.vectors, self.num_vectors)?;
        let assignments = kmeans.assign_clusters(&self.vectors, self.num_vectors);
        self.centroids = kmeans.into_centroids();

        self.lists = vec![Vec::new(); nlist];
        for (vector_idx, &list) in assignments.iter().enumerate() {
            self.lists[list].push(vector_idx as u32);
        }
        debug!(
            nlist,
            largest = self.lists.iter().map(Vec::len).max().unwrap_or(0),
            "IVF lists filled"
        );

        // Stage 2: optional product quantization
        if let IvfStorage::Pq(pq) = &mut self.storage {
            pq.fit(&self.vectors, self.num_vectors, self.params.seed)?;
            self.codes = Vec::with_capacity(self.num_vectors * pq.num_codebooks());
            for row in self.vectors.chunks_exact(self.dimension) {
                let codes = pq.quantize(row)?;
                self.codes.extend_from_slice(&codes);
            }
            // Lists hold codes now; raw vectors are no longer needed.
            self.vectors = Vec::new();
        }

        self.built = true;
        Ok(())
    }

    /// Search the `nprobe` nearest lists for the `k` nearest vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        self.check_dimension(query)?;
        if !self.built {
            return Err(AnnError::NotBuilt);
        }

        // Find closest lists
        let mut list_distances: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(idx, centroid)| (idx, self.params.metric.distance(query, centroid)))
            .collect();
        list_distances.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        let probed = list_distances
            .iter()
            .take(self.params.nprobe.max(1))
            .map(|(idx, _)| &self.lists[*idx]);

        let mut top = TopK::new(k);
        match &self.storage {
            IvfStorage::Flat => {
                for list in probed {
                    for &id in list {
                        let start = id as usize * self.dimension;
                        let vector = &self.vectors[start..start + self.dimension];
                        top.push(id, self.params.metric.distance(query, vector));
                    }
                }
            }
            IvfStorage::Pq(pq) => {
                let table = pq.compute_adc_table(query)?;
                let stride = pq.num_codebooks();
                for list in probed {
                    for &id in list {
                        let start = id as usize * stride;
                        let codes = &self.codes[start..start + stride];
                        top.push(id, pq.distance_with_table(&table, codes));
                    }
                }
            }
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

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn size_bytes(&self) -> usize {
        let floats = self.vectors.len() + self.centroids.len() * self.dimension;
        let ids: usize = self.lists.iter().map(Vec::len).sum();
        floats * std::mem::size_of::<f32>() + ids * std::mem::size_of::<u32>() + self.codes.len()
    }

    fn nearest_list(&self, vector: &[f32]) -> (usize, f32) {
        let mut best = (0, f32::INFINITY);
        for (idx, centroid) in self.centroids.iter().enumerate() {
            let dist = self.params.metric.distance(vector, centroid);
            if dist < best.1 {
                best = (idx, dist);
            }
        }
        best
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<[f32; 2]> {
        let mut rows = Vec::new();
        for i in 0..25 {
            let t = i as f32 * 0.01;
            rows.push([t, t]);
            rows.push([100.0 + t, 100.0 - t]);
        }
        rows
    }

    fn params(nlist: usize, nprobe: usize) -> IvfParams {
        IvfParams {
            nlist,
            nprobe,
            metric: DistanceMetric::L2,
            seed: Some(11),
        }
    }

    #[test]
    fn search_before_build_fails() {
        let mut index = IvfIndex::new(2, params(2, 1), IvfStorage::Flat).unwrap();
        index.add(&[0.0, 0.0]).unwrap();
        assert!(matches!(
            index.search(&[0.0, 0.0], 1),
            Err(AnnError::NotBuilt)
        ));
    }

    #[test]
    fn build_on_empty_index_fails() {
        let mut index = IvfIndex::new(2, params(2, 1), IvfStorage::Flat).unwrap();
        assert!(matches!(index.build(), Err(AnnError::EmptyIndex)));
    }

    #[test]
    fn flat_lists_return_exact_neighbors_in_probed_list() {
        let mut index = IvfIndex::new(2, params(2, 1), IvfStorage::Flat).unwrap();
        for row in two_blobs() {
            index.add(&row).unwrap();
        }
        index.build().unwrap();

        let results = index.search(&[100.0, 100.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, 1);
        assert!(results.iter().all(|(id, _)| id % 2 == 1));
    }

    #[test]
    fn nlist_is_clamped_to_vector_count() {
        let mut index = IvfIndex::new(2, params(64, 64), IvfStorage::Flat).unwrap();
        index.add(&[0.0, 0.0]).unwrap();
        index.add(&[1.0, 1.0]).unwrap();
        index.build().unwrap();
        assert_eq!(index.search(&[1.0, 1.0], 5).unwrap()[0], (1, 0.0));
    }

    #[test]
    fn pq_storage_drops_raw_vectors_and_still_searches() {
        let pq = ProductQuantizer::new(2, 2, 4, DistanceMetric::L2).unwrap();
        let mut index = IvfIndex::new(2, params(2, 2), IvfStorage::Pq(pq)).unwrap();
        for row in two_blobs() {
            index.add(&row).unwrap();
        }
        index.build().unwrap();
        assert!(index.vectors.is_empty());

        let results = index.search(&[0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].0 % 2, 0);
    }

    #[test]
    fn add_after_build_lands_in_nearest_list() {
        let mut index = IvfIndex::new(2, params(2, 1), IvfStorage::Flat).unwrap();
        for row in two_blobs() {
            index.add(&row).unwrap();
        }
        index.build().unwrap();
        let id = index.add(&[99.0, 99.0]).unwrap();
        let results = index.search(&[99.0, 99.0], 1).unwrap();
        assert_eq!(results[0], (id, 0.0));
    }
}
