//! Batched top-K search over a query stream.

use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::ann::AnnIndex;
use crate::corpus::VectorReader;
use crate::error::{AnnError, Result};

/// Summary of one [`BatchQueryRunner::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    /// Queries answered (lines written to each sink).
    pub queries: usize,
    /// Batches read from the query stream.
    pub batches: usize,
    /// Queries that got fewer than K neighbors because the index is smaller.
    pub short_results: usize,
    pub elapsed: Duration,
}

/// Streams query vectors through an index and writes neighbor labels and
/// distances, one line per query, in query order.
pub struct BatchQueryRunner<'a, I: AnnIndex + ?Sized> {
    index: &'a I,
    labels: &'a [String],
    k: usize,
    batch_size: usize,
    progress_every: usize,
}

impl<'a, I: AnnIndex + ?Sized> BatchQueryRunner<'a, I> {
    /// `labels[i]` names the vector the index assigned ordinal `i`.
    pub fn new(index: &'a I, labels: &'a [String], k: usize, batch_size: usize) -> Self {
        Self {
            index,
            labels,
            k,
            batch_size: batch_size.max(1),
            progress_every: 1_000_000,
        }
    }

    /// Log progress every `every` queries.
    #[must_use]
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Answer every query in `queries`.
    ///
    /// The query dimension is checked against the index before the first
    /// search; nothing is written on mismatch.
    pub fn run<R, L, D>(
        &self,
        queries: &mut VectorReader<R>,
        labels_out: &mut L,
        distances_out: &mut D,
    ) -> Result<RunStats>
    where
        R: BufRead,
        L: Write,
        D: Write,
    {
        if queries.dimension() != self.index.dimension() {
            return Err(AnnError::DimensionMismatch {
                expected: self.index.dimension(),
                found: queries.dimension(),
            });
        }

        let started = Instant::now();
        let mut window = Instant::now();
        let mut stats = RunStats::default();
        let mut batch = Vec::with_capacity(self.batch_size * queries.dimension());
        let dimension = queries.dimension();

        loop {
            let rows = queries.next_batch(self.batch_size, &mut batch)?.len();
            if rows == 0 {
                break;
            }
            stats.batches += 1;
            debug!(batch = stats.batches, rows, "searching batch");

            for query in batch.chunks_exact(dimension) {
                let neighbors = self.index.search(query, self.k)?;
                if neighbors.len() < self.k {
                    stats.short_results += 1;
                }
                self.write_line(&neighbors, labels_out, distances_out)?;

                stats.queries += 1;
                if stats.queries % self.progress_every == 0 {
                    info!(
                        processed = stats.queries,
                        elapsed_s = window.elapsed().as_secs_f64(),
                        "neighbor search progress"
                    );
                    window = Instant::now();
                }
            }
        }
        queries.expect_end()?;

        labels_out.flush()?;
        distances_out.flush()?;
        stats.elapsed = started.elapsed();
        Ok(stats)
    }

    fn write_line<L: Write, D: Write>(
        &self,
        neighbors: &[(u32, f32)],
        labels_out: &mut L,
        distances_out: &mut D,
    ) -> Result<()> {
        for (i, &(ordinal, distance)) in neighbors.iter().enumerate() {
            let label = self.labels.get(ordinal as usize).ok_or_else(|| {
                AnnError::InvalidParameter(format!(
                    "index returned ordinal {ordinal} but only {} labels are known",
                    self.labels.len()
                ))
            })?;
            if i > 0 {
                labels_out.write_all(b" ")?;
                distances_out.write_all(b" ")?;
            }
            labels_out.write_all(label.as_bytes())?;
            write!(distances_out, "{distance}")?;
        }
        labels_out.write_all(b"\n")?;
        distances_out.write_all(b"\n")?;
        Ok(())
    }
}
