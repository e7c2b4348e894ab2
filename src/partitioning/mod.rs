//! Vector-space partitioning used to train coarse and product quantizers.

pub mod kmeans;

pub use kmeans::KMeans;
