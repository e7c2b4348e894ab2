//! Common index contract and the string-driven index factory.
//!
//! Every index family implements [`AnnIndex`]; [`index_factory`] turns a
//! description such as `"HNSW32"` or `"IVF256,PQ8x4"` into an [`AnyIndex`]:
//!
//! ```rust
//! use wordnn::ann::{index_factory, AnnIndex, FactoryOptions};
//!
//! let mut index = index_factory(2, "Flat", &FactoryOptions::default())?;
//! index.add(&[0.0, 0.0])?;
//! index.add(&[1.0, 1.0])?;
//! index.build()?;
//! assert_eq!(index.search(&[0.9, 0.9], 1)?[0].0, 1);
//! # Ok::<(), wordnn::AnnError>(())
//! ```

pub mod factory;
pub(crate) mod topk;
pub mod traits;

pub use factory::{index_factory, AnyIndex, FactoryOptions};
pub use traits::{AnnIndex, IndexStats};
