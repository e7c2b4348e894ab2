//! Save and load an [`AnyIndex`] as a single file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::{PersistenceError, PersistenceResult};
use super::format::{encode_header, split_header};
use crate::ann::{AnnIndex, AnyIndex};

/// Serialize `index` to `path`.
///
/// The bytes are written and synced to `<path>.tmp` first, then renamed over
/// `path`. Returns the number of bytes written.
pub fn write_index(index: &AnyIndex, path: &Path) -> PersistenceResult<usize> {
    let payload = postcard::to_allocvec(index)
        .map_err(|e| PersistenceError::Serialization(format!("postcard error: {e}")))?;

    let tmp = tmp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&encode_header())?;
        file.write_all(&payload)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    let written = encode_header().len() + payload.len();
    info!(
        path = %path.display(),
        bytes = written,
        algorithm = index.algorithm(),
        "index saved"
    );
    Ok(written)
}

/// Load an index written by [`write_index`].
pub fn read_index(path: &Path) -> PersistenceResult<AnyIndex> {
    let bytes = fs::read(path)?;
    let payload = split_header(&bytes)?;
    let index: AnyIndex = postcard::from_bytes(payload)
        .map_err(|e| PersistenceError::Deserialization(format!("postcard error: {e}")))?;
    debug!(
        path = %path.display(),
        num_vectors = index.num_vectors(),
        dimension = index.dimension(),
        "index loaded"
    );
    Ok(index)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
