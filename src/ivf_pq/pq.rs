//! Product Quantization (PQ).
//!
//! A vector is split into `m` equal subvectors and each subvector is replaced
//! by the id of its nearest codeword in a per-subspace codebook of
//! `2^nbits` entries. Search uses asymmetric distance computation (ADC): the
//! query stays exact and distances to every codeword are tabulated once.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ann::topk::TopK;
use crate::distance::DistanceMetric;
use crate::error::{check_finite, AnnError, Result};
use crate::partitioning::KMeans;
use crate::simd;

/// Largest supported code width; codes are stored as `u8`.
pub const MAX_NBITS: u8 = 8;

/// Product Quantizer.
///
/// Decomposes vectors into subvectors and quantizes each subvector independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductQuantizer {
    dimension: usize,
    num_codebooks: usize,
    codebook_size: usize,
    subvector_dim: usize,
    metric: DistanceMetric,
    codebooks: Vec<Vec<Vec<f32>>>, // [codebook][codeword][dimension]
}

impl ProductQuantizer {
    /// Create an untrained quantizer with `num_codebooks` subspaces of
    /// `2^nbits` codewords each.
    pub fn new(
        dimension: usize,
        num_codebooks: usize,
        nbits: u8,
        metric: DistanceMetric,
    ) -> Result<Self> {
        if dimension == 0 || num_codebooks == 0 {
            return Err(AnnError::InvalidParameter(
                "PQ dimension and sub-quantizer count must be greater than 0".to_string(),
            ));
        }
        if nbits == 0 || nbits > MAX_NBITS {
            return Err(AnnError::InvalidParameter(format!(
                "PQ code width must be in 1..={MAX_NBITS} bits, got {nbits}"
            )));
        }
        if dimension % num_codebooks != 0 {
            return Err(AnnError::InvalidParameter(format!(
                "dimension {dimension} is not divisible by {num_codebooks} sub-quantizers"
            )));
        }

        Ok(Self {
            dimension,
            num_codebooks,
            codebook_size: 1usize << nbits,
            subvector_dim: dimension / num_codebooks,
            metric,
            codebooks: Vec::new(),
        })
    }

    pub fn is_trained(&self) -> bool {
        !self.codebooks.is_empty()
    }

    pub fn num_codebooks(&self) -> usize {
        self.num_codebooks
    }

    /// Train one codebook per subspace with k-means.
    pub fn fit(&mut self, vectors: &[f32], num_vectors: usize, seed: Option<u64>) -> Result<()> {
        if num_vectors == 0 {
            return Err(AnnError::EmptyIndex);
        }
        if num_vectors < self.codebook_size {
            warn!(
                num_vectors,
                codebook_size = self.codebook_size,
                "fewer training vectors than PQ codewords; some codewords will repeat"
            );
        }

        let training = self.prepare_all(vectors, num_vectors);
        self.codebooks = Vec::with_capacity(self.num_codebooks);

        for codebook_idx in 0..self.num_codebooks {
            let start_dim = codebook_idx * self.subvector_dim;
            let end_dim = start_dim + self.subvector_dim;

            // Flatten this subspace for k-means.
            let mut flat = Vec::with_capacity(num_vectors * self.subvector_dim);
            for row in training.chunks_exact(self.dimension) {
                flat.extend_from_slice(&row[start_dim..end_dim]);
            }

            let mut kmeans = KMeans::new(self.subvector_dim, self.codebook_size)?
                .with_seed(seed.map(|s| s.wrapping_add(codebook_idx as u64)));
            kmeans.fit(&flat, num_vectors)?;
            self.codebooks.push(kmeans.into_centroids());
        }

        Ok(())
    }

    /// Quantize a vector into one code per subspace.
    pub fn quantize(&self, vector: &[f32]) -> Result<Vec<u8>> {
        self.check_dimension(vector)?;
        if !self.is_trained() {
            return Err(AnnError::NotBuilt);
        }
        let vector = self.prepare(vector);

        let codes = self
            .codebooks
            .iter()
            .zip(vector.chunks_exact(self.subvector_dim))
            .map(|(codebook, subvector)| {
                let mut best_code = 0u8;
                let mut best_dist = f32::INFINITY;
                for (code, codeword) in codebook.iter().enumerate() {
                    // Codes are assigned by reconstruction error whatever the metric.
                    let dist = simd::l2_distance_squared(subvector, codeword);
                    if dist < best_dist {
                        best_dist = dist;
                        best_code = code as u8;
                    }
                }
                best_code
            })
            .collect();

        Ok(codes)
    }

    /// Compute the ADC lookup table for `query`.
    ///
    /// Table layout: `[codebook_0_codeword_0, codebook_0_codeword_1, ..., codebook_1_codeword_0, ...]`
    pub fn compute_adc_table(&self, query: &[f32]) -> Result<Vec<f32>> {
        self.check_dimension(query)?;
        if !self.is_trained() {
            return Err(AnnError::NotBuilt);
        }
        let query = self.prepare(query);

        let mut table = Vec::with_capacity(self.num_codebooks * self.codebook_size);
        for (codebook, subquery) in self
            .codebooks
            .iter()
            .zip(query.chunks_exact(self.subvector_dim))
        {
            for codeword in codebook {
                let dist = match self.metric {
                    DistanceMetric::L2 => simd::l2_distance_squared(subquery, codeword),
                    DistanceMetric::InnerProduct | DistanceMetric::Cosine => {
                        -simd::dot(subquery, codeword)
                    }
                };
                table.push(dist);
            }
        }

        Ok(table)
    }

    /// Approximate distance from the tabulated query to a coded vector.
    #[inline]
    pub fn distance_with_table(&self, table: &[f32], codes: &[u8]) -> f32 {
        let partial: f32 = codes
            .iter()
            .enumerate()
            .map(|(codebook_idx, &code)| table[codebook_idx * self.codebook_size + code as usize])
            .sum();
        match self.metric {
            // Both sides are unit length, so -dot + 1 is 1 - cos.
            DistanceMetric::Cosine => 1.0 + partial,
            DistanceMetric::L2 | DistanceMetric::InnerProduct => partial,
        }
    }

    /// Get codebooks (for testing/debugging).
    pub fn codebooks(&self) -> &[Vec<Vec<f32>>] {
        &self.codebooks
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

    /// Cosine codebooks live on the unit sphere; other metrics use raw vectors.
    fn prepare(&self, vector: &[f32]) -> Vec<f32> {
        match self.metric {
            DistanceMetric::Cosine => normalized(vector),
            DistanceMetric::L2 | DistanceMetric::InnerProduct => vector.to_vec(),
        }
    }

    fn prepare_all(&self, vectors: &[f32], num_vectors: usize) -> Vec<f32> {
        let rows = &vectors[..num_vectors * self.dimension];
        match self.metric {
            DistanceMetric::Cosine => rows
                .chunks_exact(self.dimension)
                .flat_map(normalized)
                .collect(),
            DistanceMetric::L2 | DistanceMetric::InnerProduct => rows.to_vec(),
        }
    }
}

fn normalized(vector: &[f32]) -> Vec<f32> {
    let norm = simd::norm(vector);
    if norm > 0.0 {
        vector.iter().map(|x| x / norm).collect()
    } else {
        vector.to_vec()
    }
}

/// Standalone PQ index (`PQ<m>[x<nbits>]`).
///
/// Vectors added before `build` are buffered raw; `build` trains the codebooks
/// on them, encodes them and drops the raw copies. Vectors added afterwards are
/// encoded immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PqIndex {
    quantizer: ProductQuantizer,
    pending: Vec<f32>,
    codes: Vec<u8>,
    num_vectors: usize,
    seed: Option<u64>,
}

impl PqIndex {
    pub fn new(
        dimension: usize,
        num_codebooks: usize,
        nbits: u8,
        metric: DistanceMetric,
        seed: Option<u64>,
    ) -> Result<Self> {
        Ok(Self {
            quantizer: ProductQuantizer::new(dimension, num_codebooks, nbits, metric)?,
            pending: Vec::new(),
            codes: Vec::new(),
            num_vectors: 0,
            seed,
        })
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<u32> {
        self.quantizer.check_dimension(vector)?;
        check_finite(vector, self.num_vectors)?;
        let id = u32::try_from(self.num_vectors).map_err(|_| {
            AnnError::InvalidParameter("index is full (u32 ordinals exhausted)".to_string())
        })?;
        if self.quantizer.is_trained() {
            let codes = self.quantizer.quantize(vector)?;
            self.codes.extend_from_slice(&codes);
        } else {
            self.pending.extend_from_slice(vector);
        }
        self.num_vectors += 1;
        Ok(id)
    }

    /// Train the codebooks and encode every buffered vector.
    pub fn build(&mut self) -> Result<()> {
        if self.quantizer.is_trained() {
            return Ok(());
        }
        self.quantizer
            .fit(&self.pending, self.num_vectors, self.seed)?;

        let pending = std::mem::take(&mut self.pending);
        self.codes = Vec::with_capacity(self.num_vectors * self.quantizer.num_codebooks);
        for row in pending.chunks_exact(self.quantizer.dimension) {
            let codes = self.quantizer.quantize(row)?;
            self.codes.extend_from_slice(&codes);
        }
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        self.quantizer.check_dimension(query)?;
        if !self.quantizer.is_trained() {
            return Err(AnnError::NotBuilt);
        }
        let table = self.quantizer.compute_adc_table(query)?;

        let mut top = TopK::new(k);
        for (id, codes) in self
            .codes
            .chunks_exact(self.quantizer.num_codebooks)
            .enumerate()
        {
            top.push(id as u32, self.quantizer.distance_with_table(&table, codes));
        }
        Ok(top.into_sorted())
    }

    pub fn dimension(&self) -> usize {
        self.quantizer.dimension
    }

    pub fn len(&self) -> usize {
        self.num_vectors
    }

    pub fn is_empty(&self) -> bool {
        self.num_vectors == 0
    }

    pub fn is_built(&self) -> bool {
        self.quantizer.is_trained()
    }

    pub fn size_bytes(&self) -> usize {
        let codebook_floats = self.quantizer.num_codebooks
            * self.quantizer.codebook_size
            * self.quantizer.subvector_dim;
        self.codes.len()
            + (self.pending.len() + codebook_floats) * std::mem::size_of::<f32>()
    }
}
