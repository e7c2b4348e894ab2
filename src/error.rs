//! Error types for wordnn.

use std::path::PathBuf;

use thiserror::Error;

use crate::persistence::PersistenceError;

/// Errors that can occur while loading vectors, building an index or searching it.
#[derive(Debug, Error)]
pub enum AnnError {
    /// Missing or invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Factory string could not be resolved into an index.
    #[error("cannot parse index key {key:?}: {reason}")]
    Factory { key: String, reason: String },

    /// Malformed vector file.
    #[error("{}:{line}: {message}", path.display())]
    InputFormat {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Vector dimension differs from the one the index or corpus was created with.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Operation needs at least one indexed vector.
    #[error("index is empty")]
    EmptyIndex,

    /// Index has to be trained with `build()` before it can be searched.
    #[error("index must be built before search")]
    NotBuilt,

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Index file could not be written or read back.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// I/O error on an input or output stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnnError {
    pub(crate) fn input_format(
        path: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::InputFormat {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnError>;

/// Reject NaN and infinite components of the vector about to get `ordinal`.
pub(crate) fn check_finite(vector: &[f32], ordinal: usize) -> Result<()> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(pos) => Err(AnnError::InvalidParameter(format!(
            "component {pos} of vector {ordinal} is not finite"
        ))),
        None => Ok(()),
    }
}
