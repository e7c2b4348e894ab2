//! On-disk layout of an index file.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Magic bytes (4B): "WNNX"                │
//! ├─────────────────────────────────────────┤
//! │ Format version (4B, little endian)      │
//! ├─────────────────────────────────────────┤
//! │ postcard payload: the whole index       │
//! │   - variant (HNSW, Flat, PQ, IVF)       │
//! │   - params, metric included             │
//! │   - stored vectors / codes              │
//! │   - graph levels and adjacency          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Version handling: a reader accepts exactly [`FORMAT_VERSION`]; any other
//! value is a format error rather than a best-effort decode.

use super::error::{PersistenceError, PersistenceResult};

/// Magic bytes for index files.
pub const INDEX_MAGIC: &[u8; 4] = b"WNNX";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Length of the fixed header preceding the payload.
pub const HEADER_LEN: usize = 8;

/// Encode the fixed header.
pub fn encode_header() -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(INDEX_MAGIC);
    header[4..].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header
}

/// Validate the fixed header and return the payload that follows it.
pub fn split_header(bytes: &[u8]) -> PersistenceResult<&[u8]> {
    if bytes.len() < HEADER_LEN {
        return Err(PersistenceError::Format(format!(
            "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[..4] != INDEX_MAGIC {
        return Err(PersistenceError::Format(format!(
            "bad magic {:?}, expected {:?}",
            &header[..4],
            INDEX_MAGIC
        )));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&header[4..]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(PersistenceError::Format(format!(
            "unsupported format version {version}, expected {FORMAT_VERSION}"
        )));
    }
    Ok(payload)
}
