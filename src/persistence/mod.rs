//! Disk persistence for indexes.
//!
//! An index is saved as a single self-describing file (see [`format`]). Writes
//! go to `<path>.tmp` and are renamed into place, so a crash never leaves a
//! half-written index at `path`.

pub mod error;
pub mod format;
pub mod index_file;

pub use error::{PersistenceError, PersistenceResult};
pub use index_file::{read_index, write_index};
