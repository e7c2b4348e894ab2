//! k-means clustering.
//!
//! Lloyd iterations with k-means++ seeding, under squared L2. Trains the coarse
//! quantizer of the IVF index and the sub-quantizer codebooks of PQ.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distance::l2_squared;
use crate::error::{AnnError, Result};

const MAX_ITERATIONS: usize = 25;
const CONVERGENCE_EPSILON: f32 = 1e-6;

/// k-means clustering for partitioning vectors.
pub struct KMeans {
    /// Centroids (k x dimension)
    centroids: Vec<Vec<f32>>,
    dimension: usize,
    k: usize,
    seed: Option<u64>,
    max_iterations: usize,
}

impl KMeans {
    /// Create new k-means with k clusters.
    pub fn new(dimension: usize, k: usize) -> Result<Self> {
        if dimension == 0 || k == 0 {
            return Err(AnnError::InvalidParameter(
                "k-means dimension and k must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            centroids: Vec::new(),
            dimension,
            k,
            seed: None,
            max_iterations: MAX_ITERATIONS,
        })
    }

    /// Configure a deterministic seed for k-means++ initialization.
    ///
    /// When set, repeated `fit(...)` calls on the same inputs produce identical results.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Train on `num_vectors` rows of `vectors`.
    pub fn fit(&mut self, vectors: &[f32], num_vectors: usize) -> Result<()> {
        if num_vectors == 0 {
            return Err(AnnError::EmptyIndex);
        }
        if vectors.len() < num_vectors * self.dimension {
            return Err(AnnError::InvalidParameter(format!(
                "k-means expected {} values, got {}",
                num_vectors * self.dimension,
                vectors.len()
            )));
        }

        self.centroids = self.kmeans_plus_plus(vectors, num_vectors);

        for _iteration in 0..self.max_iterations {
            let assignments = self.assign_clusters(vectors, num_vectors);
            let new_centroids = self.update_centroids(vectors, num_vectors, &assignments);

            let converged = self
                .centroids
                .iter()
                .zip(new_centroids.iter())
                .all(|(old, new)| l2_squared(old, new) <= CONVERGENCE_EPSILON);

            self.centroids = new_centroids;
            if converged {
                break;
            }
        }

        Ok(())
    }

    /// k-means++ initialization.
    fn kmeans_plus_plus(&self, vectors: &[f32], num_vectors: usize) -> Vec<Vec<f32>> {
        // Use an explicit seed when configured; otherwise derive one from entropy.
        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);

        let mut centroids = Vec::with_capacity(self.k);

        let first_idx = rng.random_range(0..num_vectors);
        centroids.push(self.get_vector(vectors, first_idx).to_vec());

        // Distance of every point to its nearest chosen centroid, updated incrementally.
        let mut nearest: Vec<f32> = (0..num_vectors)
            .map(|i| l2_squared(self.get_vector(vectors, i), &centroids[0]))
            .collect();

        for _ in 1..self.k {
            let total: f64 = nearest.iter().map(|&d| d as f64).sum();
            let next_idx = if total <= 0.0 {
                // Every point coincides with a centroid already.
                rng.random_range(0..num_vectors)
            } else {
                let threshold = rng.random::<f64>() * total;
                let mut cumulative = 0.0;
                nearest
                    .iter()
                    .position(|&d| {
                        cumulative += d as f64;
                        cumulative >= threshold
                    })
                    .unwrap_or(num_vectors - 1)
            };

            let centroid = self.get_vector(vectors, next_idx).to_vec();
            for (i, d) in nearest.iter_mut().enumerate() {
                *d = d.min(l2_squared(self.get_vector(vectors, i), &centroid));
            }
            centroids.push(centroid);
        }

        centroids
    }

    /// Assign vectors to nearest clusters.
    pub fn assign_clusters(&self, vectors: &[f32], num_vectors: usize) -> Vec<usize> {
        (0..num_vectors)
            .map(|i| self.nearest_centroid(self.get_vector(vectors, i)).0)
            .collect()
    }

    /// Index and squared distance of the centroid closest to `vector`.
    pub fn nearest_centroid(&self, vector: &[f32]) -> (usize, f32) {
        let mut best = (0, f32::INFINITY);
        for (idx, centroid) in self.centroids.iter().enumerate() {
            let dist = l2_squared(vector, centroid);
            if dist < best.1 {
                best = (idx, dist);
            }
        }
        best
    }

    /// Update centroids as the mean of their members. Empty clusters keep their centroid.
    fn update_centroids(
        &self,
        vectors: &[f32],
        num_vectors: usize,
        assignments: &[usize],
    ) -> Vec<Vec<f32>> {
        let mut cluster_sums = vec![vec![0.0f32; self.dimension]; self.k];
        let mut cluster_counts = vec![0usize; self.k];

        for (i, &cluster) in assignments.iter().enumerate().take(num_vectors) {
            cluster_counts[cluster] += 1;
            for (sum, &val) in cluster_sums[cluster]
                .iter_mut()
                .zip(self.get_vector(vectors, i))
            {
                *sum += val;
            }
        }

        cluster_sums
            .into_iter()
            .zip(cluster_counts)
            .zip(self.centroids.iter())
            .map(|((sums, count), old)| {
                if count > 0 {
                    sums.into_iter().map(|s| s / count as f32).collect()
                } else {
                    old.clone()
                }
            })
            .collect()
    }

    fn get_vector<'a>(&self, vectors: &'a [f32], idx: usize) -> &'a [f32] {
        let start = idx * self.dimension;
        &vectors[start..start + self.dimension]
    }

    pub fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    pub fn into_centroids(self) -> Vec<Vec<f32>> {
        self.centroids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn separates_two_blobs() {
        let mut vectors = Vec::new();
        for i in 0..20 {
            let jitter = i as f32 * 0.01;
            vectors.extend_from_slice(&[jitter, jitter]);
            vectors.extend_from_slice(&[10.0 + jitter, 10.0 - jitter]);
        }
        let mut km = KMeans::new(2, 2).unwrap().with_seed(Some(3));
        km.fit(&vectors, 40).unwrap();

        let assignments = km.assign_clusters(&vectors, 40);
        for pair in assignments.chunks(2) {
            assert_ne!(pair[0], pair[1]);
        }
        for a in assignments.iter().step_by(2) {
            assert_eq!(*a, assignments[0]);
        }
    }

    #[test]
    fn more_clusters_than_points_does_not_panic() {
        let vectors = [0.0f32, 1.0, 2.0];
        let mut km = KMeans::new(1, 8).unwrap().with_seed(Some(1));
        km.fit(&vectors, 3).unwrap();
        assert_eq!(km.centroids().len(), 8);
    }

    proptest! {
        #[test]
        fn prop_kmeans_fit_is_deterministic_given_seed(
            seed in any::<u64>(),
            dimension in 1usize..8,
            num_vectors in 2usize..48,
            k in 1usize..8,
            raw in proptest::collection::vec(-1.0f32..1.0f32, 8usize*48),
        ) {
            prop_assume!(k <= num_vectors);
            let vectors = raw[..num_vectors * dimension].to_vec();

            let mut km1 = KMeans::new(dimension, k).unwrap().with_seed(Some(seed));
            let mut km2 = KMeans::new(dimension, k).unwrap().with_seed(Some(seed));

            km1.fit(&vectors, num_vectors).unwrap();
            km2.fit(&vectors, num_vectors).unwrap();

            let a1 = km1.assign_clusters(&vectors, num_vectors);
            let a2 = km2.assign_clusters(&vectors, num_vectors);
            prop_assert_eq!(a1, a2);
        }
    }
}
