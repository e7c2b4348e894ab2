//! Distance metrics for dense vectors.
//!
//! Every index in this crate ranks by *distance*: smaller is nearer. Similarity
//! measures are therefore negated or complemented:
//!
//! - [`DistanceMetric::L2`] is the **squared** Euclidean distance (no square root,
//!   same ordering, cheaper).
//! - [`DistanceMetric::InnerProduct`] is $-\langle a,b\rangle$ (maximum inner product search).
//! - [`DistanceMetric::Cosine`] is $1 - \cos(a,b)$ and computes norms, so inputs do not
//!   need to be normalized.
//!
//! An index stores its metric and uses it for both construction and search.

use serde::{Deserialize, Serialize};

use crate::simd;

/// Distance metric for dense vectors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    #[default]
    #[value(name = "l2")]
    L2,
    /// Negative dot product.
    #[value(name = "ip")]
    InnerProduct,
    /// Cosine distance $1 - \cos(a,b)$.
    #[value(name = "cosine")]
    Cosine,
}

impl DistanceMetric {
    /// Compute distance between two vectors.
    ///
    /// If dimensions mismatch, this returns `f32::INFINITY` (so it is never selected as a
    /// nearest neighbor).
    #[inline]
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => l2_squared(a, b),
            DistanceMetric::InnerProduct => inner_product_distance(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }

    /// Short name used in logs and index statistics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::InnerProduct => "ip",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Squared L2 distance.
#[inline]
#[must_use]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    simd::l2_distance_squared(a, b)
}

/// Cosine distance $1 - \cos(a,b)$.
#[inline]
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    1.0 - simd::cosine(a, b).clamp(-1.0, 1.0)
}

/// Inner product distance (negative dot product).
#[inline]
#[must_use]
pub fn inner_product_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    -simd::dot(a, b)
}
