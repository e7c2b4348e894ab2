//! Index factory: build an index from a short string description.
//!
//! | key | index |
//! |-----|-------|
//! | `hnswcustom` | HNSW with degree and beam widths from [`FactoryOptions`] |
//! | `HNSW<M>`, `HNSW<M>,Flat` | HNSW with degree `M` and default beam widths |
//! | `Flat` | exhaustive scan |
//! | `PQ<m>`, `PQ<m>x<nbits>` | product quantizer |
//! | `IVF<n>,Flat` | inverted file over raw vectors |
//! | `IVF<n>,PQ<m>[x<nbits>]` | inverted file over PQ codes |
//!
//! Anything else is rejected; there is no silent fallback.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::traits::AnnIndex;
use crate::distance::DistanceMetric;
use crate::error::{AnnError, Result};
use crate::flat::FlatIndex;
use crate::hnsw::{HnswIndex, HnswParams};
use crate::ivf_pq::{IvfIndex, IvfParams, IvfStorage, PqIndex, ProductQuantizer};

/// Key that takes every HNSW parameter from the options.
pub const CUSTOM_HNSW_KEY: &str = "hnswcustom";

const DEFAULT_PQ_NBITS: u8 = 8;

/// Knobs that the factory string itself does not carry.
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryOptions {
    /// Degree used by `hnswcustom`.
    pub links_per_vector: usize,
    /// Construction beam used by `hnswcustom`.
    pub ef_construction: usize,
    /// Search beam used by `hnswcustom`.
    pub ef_search: usize,
    pub metric: DistanceMetric,
    /// Lists probed per query by IVF indexes.
    pub nprobe: usize,
    /// Seed for HNSW level draws and k-means initialization.
    pub seed: Option<u64>,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            links_per_vector: 8,
            ef_construction: 26,
            ef_search: 64,
            metric: DistanceMetric::L2,
            nprobe: 1,
            seed: None,
        }
    }
}

/// Any index the factory can produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnyIndex {
    Hnsw(HnswIndex),
    Flat(FlatIndex),
    Pq(PqIndex),
    Ivf(IvfIndex),
}

impl AnyIndex {
    fn inner(&self) -> &dyn AnnIndex {
        match self {
            Self::Hnsw(index) => index,
            Self::Flat(index) => index,
            Self::Pq(index) => index,
            Self::Ivf(index) => index,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AnnIndex {
        match self {
            Self::Hnsw(index) => index,
            Self::Flat(index) => index,
            Self::Pq(index) => index,
            Self::Ivf(index) => index,
        }
    }

    /// The graph index, when this is one.
    pub fn as_hnsw(&self) -> Option<&HnswIndex> {
        match self {
            Self::Hnsw(index) => Some(index),
            _ => None,
        }
    }
}

impl AnnIndex for AnyIndex {
    fn add(&mut self, vector: &[f32]) -> Result<u32> {
        self.inner_mut().add(vector)
    }

    fn build(&mut self) -> Result<()> {
        self.inner_mut().build()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        self.inner().search(query, k)
    }

    fn dimension(&self) -> usize {
        self.inner().dimension()
    }

    fn num_vectors(&self) -> usize {
        self.inner().num_vectors()
    }

    fn size_bytes(&self) -> usize {
        self.inner().size_bytes()
    }

    fn algorithm(&self) -> &'static str {
        self.inner().algorithm()
    }
}

/// Create an empty index for `dimension`-sized vectors from a description string.
pub fn index_factory(dimension: usize, key: &str, options: &FactoryOptions) -> Result<AnyIndex> {
    if dimension == 0 {
        return Err(AnnError::InvalidParameter(
            "dimension must be positive".to_string(),
        ));
    }
    let stages: Vec<&str> = key.split(',').map(str::trim).collect();

    let index = match stages.as_slice() {
        [CUSTOM_HNSW_KEY] => {
            let params = HnswParams {
                ef_construction: options.ef_construction,
                ef_search: options.ef_search,
                metric: options.metric,
                seed: options.seed,
                ..HnswParams::with_m(options.links_per_vector)
            };
            AnyIndex::Hnsw(HnswIndex::with_params(dimension, params).map_err(|e| invalid(key, e))?)
        }
        [hnsw] | [hnsw, "Flat"] if hnsw.starts_with("HNSW") => {
            let m = parse_count(key, hnsw, "HNSW")?;
            let params = HnswParams {
                metric: options.metric,
                seed: options.seed,
                ..HnswParams::with_m(m)
            };
            AnyIndex::Hnsw(HnswIndex::with_params(dimension, params).map_err(|e| invalid(key, e))?)
        }
        ["Flat"] => AnyIndex::Flat(FlatIndex::new(dimension, options.metric)?),
        [pq] if pq.starts_with("PQ") => {
            let (m, nbits) = parse_pq(key, pq)?;
            AnyIndex::Pq(
                PqIndex::new(dimension, m, nbits, options.metric, options.seed)
                    .map_err(|e| invalid(key, e))?,
            )
        }
        [ivf, storage] if ivf.starts_with("IVF") => {
            let nlist = parse_count(key, ivf, "IVF")?;
            let storage = match *storage {
                "Flat" => IvfStorage::Flat,
                pq if pq.starts_with("PQ") => {
                    let (m, nbits) = parse_pq(key, pq)?;
                    IvfStorage::Pq(
                        ProductQuantizer::new(dimension, m, nbits, options.metric)
                            .map_err(|e| invalid(key, e))?,
                    )
                }
                other => {
                    return Err(factory_error(
                        key,
                        format!("unknown IVF storage stage {other:?}"),
                    ))
                }
            };
            let params = IvfParams {
                nlist,
                nprobe: options.nprobe.max(1),
                metric: options.metric,
                seed: options.seed,
            };
            AnyIndex::Ivf(IvfIndex::new(dimension, params, storage).map_err(|e| invalid(key, e))?)
        }
        _ => {
            return Err(factory_error(
                key,
                format!("unsupported stage {:?}", stages.first().copied().unwrap_or("")),
            ))
        }
    };

    info!(key, dimension, algorithm = index.algorithm(), "index created");
    Ok(index)
}

/// Parse `<prefix><count>` such as `HNSW32` or `IVF1024`.
fn parse_count(key: &str, stage: &str, prefix: &str) -> Result<usize> {
    let digits = &stage[prefix.len()..];
    match digits.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(factory_error(
            key,
            format!("stage {stage:?} needs a positive count after {prefix}"),
        )),
    }
}

/// Parse `PQ<m>` or `PQ<m>x<nbits>`.
fn parse_pq(key: &str, stage: &str) -> Result<(usize, u8)> {
    let rest = &stage["PQ".len()..];
    let (m, nbits) = match rest.split_once('x') {
        Some((m, nbits)) => (m, Some(nbits)),
        None => (rest, None),
    };
    let m = match m.parse::<usize>() {
        Ok(m) if m > 0 => m,
        _ => {
            return Err(factory_error(
                key,
                format!("stage {stage:?} needs a positive sub-quantizer count"),
            ))
        }
    };
    let nbits = match nbits {
        None => DEFAULT_PQ_NBITS,
        Some(bits) => bits.parse::<u8>().map_err(|_| {
            factory_error(key, format!("stage {stage:?} has an invalid bit width"))
        })?,
    };
    Ok((m, nbits))
}

fn factory_error(key: &str, reason: String) -> AnnError {
    AnnError::Factory {
        key: key.to_string(),
        reason,
    }
}

fn invalid(key: &str, err: AnnError) -> AnnError {
    factory_error(key, err.to_string())
}
