//! Word-vector files in the word2vec text format.
//!
//! ```text
//! <count> <dimension>
//! <label> <f32> <f32> ... (dimension values)
//! ...
//! ```
//!
//! Tokens are separated by any whitespace; blank lines are skipped. The corpus
//! is loaded whole ([`VectorCorpus::load`]), queries are streamed in bounded
//! batches ([`VectorReader::next_batch`]).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{AnnError, Result};

const LOAD_PROGRESS_EVERY: usize = 1_000_000;

/// The `<count> <dimension>` line at the top of a vector file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorHeader {
    pub count: usize,
    pub dimension: usize,
}

/// Streaming reader over a vector file.
pub struct VectorReader<R> {
    reader: R,
    path: PathBuf,
    header: VectorHeader,
    line_no: usize,
    rows_read: usize,
    line: String,
}

impl VectorReader<BufReader<File>> {
    /// Open `path` and parse its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| AnnError::input_format(path, 0, format!("cannot open: {e}")))?;
        Self::new(BufReader::new(file), path)
    }
}

impl<R: BufRead> VectorReader<R> {
    /// Wrap `reader` and parse the header. `path` is only used in error messages.
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Result<Self> {
        let mut this = Self {
            reader,
            path: path.into(),
            header: VectorHeader {
                count: 0,
                dimension: 0,
            },
            line_no: 0,
            rows_read: 0,
            line: String::new(),
        };
        this.header = this.read_header()?;
        Ok(this)
    }

    pub fn header(&self) -> VectorHeader {
        self.header
    }

    pub fn dimension(&self) -> usize {
        self.header.dimension
    }

    /// Rows announced by the header and not read yet.
    pub fn remaining(&self) -> usize {
        self.header.count - self.rows_read
    }

    fn read_header(&mut self) -> Result<VectorHeader> {
        if !self.next_non_blank_line()? {
            return Err(self.error("missing `<count> <dimension>` header"));
        }
        let mut tokens = self.line.split_whitespace();
        let (Some(count), Some(dimension), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(self.error("header must be `<count> <dimension>`"));
        };
        let count = count
            .parse::<usize>()
            .map_err(|_| self.error(format!("invalid vector count {count:?}")))?;
        let dimension = match dimension.parse::<usize>() {
            Ok(d) if d > 0 => d,
            _ => return Err(self.error(format!("invalid dimension {dimension:?}"))),
        };
        Ok(VectorHeader { count, dimension })
    }

    /// Read the next row into `out`, returning its label.
    ///
    /// Returns `None` once the header's count has been consumed. Running out of
    /// input before that is an error.
    pub fn next_into(&mut self, out: &mut Vec<f32>) -> Result<Option<String>> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        if !self.next_non_blank_line()? {
            return Err(self.error(format!(
                "expected {} vectors, found {}",
                self.header.count, self.rows_read
            )));
        }

        let dimension = self.header.dimension;
        let mut tokens = self.line.split_whitespace();
        let label = tokens.next().unwrap_or_default().to_string();

        let start = out.len();
        out.reserve(dimension);
        for token in tokens {
            let value = match token.parse::<f32>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    out.truncate(start);
                    return Err(self.error(format!("invalid component {token:?}")));
                }
            };
            out.push(value);
        }
        let found = out.len() - start;
        if found != dimension {
            out.truncate(start);
            return Err(self.error(format!(
                "expected {dimension} values after label {label:?}, found {found}"
            )));
        }

        self.rows_read += 1;
        Ok(Some(label))
    }

    /// Read up to `max_rows` rows, replacing the contents of `vectors`.
    ///
    /// Returns the labels of the rows read; the batch is shorter than
    /// `max_rows` only at the end of the stream.
    pub fn next_batch(&mut self, max_rows: usize, vectors: &mut Vec<f32>) -> Result<Vec<String>> {
        vectors.clear();
        let rows = max_rows.min(self.remaining());
        let mut labels = Vec::with_capacity(rows);
        for _ in 0..rows {
            match self.next_into(vectors)? {
                Some(label) => labels.push(label),
                None => break,
            }
        }
        Ok(labels)
    }

    /// Fail if non-blank lines follow the announced rows.
    pub fn expect_end(&mut self) -> Result<()> {
        if self.remaining() == 0 && self.next_non_blank_line()? {
            return Err(self.error(format!(
                "more vectors than the {} announced in the header",
                self.header.count
            )));
        }
        Ok(())
    }

    fn next_non_blank_line(&mut self) -> Result<bool> {
        loop {
            self.line.clear();
            let read = self.reader.read_line(&mut self.line).map_err(|e| {
                AnnError::input_format(&self.path, self.line_no + 1, format!("read failed: {e}"))
            })?;
            if read == 0 {
                return Ok(false);
            }
            self.line_no += 1;
            if !self.line.trim().is_empty() {
                return Ok(true);
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> AnnError {
        AnnError::input_format(&self.path, self.line_no, message)
    }
}

/// Labels and vectors of a whole vector file, in file order.
#[derive(Debug, Clone)]
pub struct VectorCorpus {
    labels: Vec<String>,
    vectors: Vec<f32>,
    dimension: usize,
}

impl VectorCorpus {
    /// Load every row of `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let corpus = Self::from_reader(VectorReader::open(path)?)?;
        info!(
            path = %path.display(),
            vectors = corpus.len(),
            dimension = corpus.dimension,
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// Drain `reader` into memory. The row count must match the header exactly.
    pub fn from_reader<R: BufRead>(mut reader: VectorReader<R>) -> Result<Self> {
        let header = reader.header();
        // The header is untrusted; grow past this instead of reserving it all up front.
        let reserve = header.count.min(LOAD_PROGRESS_EVERY);
        let mut labels = Vec::with_capacity(reserve);
        let mut vectors = Vec::with_capacity(reserve.saturating_mul(header.dimension));

        while let Some(label) = reader.next_into(&mut vectors)? {
            labels.push(label);
            if labels.len() % LOAD_PROGRESS_EVERY == 0 {
                debug!(read = labels.len(), "reading vectors");
            }
        }
        reader.expect_end()?;

        Ok(Self {
            labels,
            vectors,
            dimension: header.dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// All vectors, row-major.
    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn label(&self, ordinal: usize) -> Option<&str> {
        self.labels.get(ordinal).map(String::as_str)
    }

    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        let start = ordinal.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// `(label, vector)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.vectors.chunks_exact(self.dimension))
    }
}
