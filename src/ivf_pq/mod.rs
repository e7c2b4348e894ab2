//! Inverted-file and product-quantized indexes.
//!
//! - [`PqIndex`]: every vector coded with a [`ProductQuantizer`], scanned with
//!   ADC lookup tables.
//! - [`IvfIndex`]: a k-means coarse quantizer splits the corpus into `nlist`
//!   inverted lists; a query scans only the `nprobe` nearest lists, holding
//!   either raw vectors or PQ codes.
//!
//! Both train in `build()` and return [`AnnError::NotBuilt`](crate::AnnError::NotBuilt)
//! when searched before it.
//!
//! | Parameter | ↑ Effect |
//! |-----------|----------|
//! | nprobe | Better recall, slower search |
//! | nlist | Better partitioning, slower training |
//! | PQ sub-quantizers | More memory, better accuracy |
//!
//! ## References
//!
//! - Jégou, Douze, Schmid (2011). "Product Quantization for Nearest Neighbor Search."

pub mod pq;
pub mod search;

pub use pq::{PqIndex, ProductQuantizer};
pub use search::{IvfIndex, IvfParams, IvfStorage};
