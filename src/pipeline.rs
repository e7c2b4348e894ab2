//! The `nn` workflow: load → index → persist → batched search.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::ann::{index_factory, AnnIndex, AnyIndex};
use crate::config::NnConfig;
use crate::corpus::{VectorCorpus, VectorReader};
use crate::error::{AnnError, Result};
use crate::persistence::write_index;
use crate::runner::{BatchQueryRunner, RunStats};

/// Build an index over `corpus` as described by `config`.
pub fn build_index(corpus: &VectorCorpus, config: &NnConfig) -> Result<AnyIndex> {
    let mut index = index_factory(
        corpus.dimension(),
        &config.index_key,
        &config.factory_options(),
    )?;
    for (_, vector) in corpus.iter() {
        index.add(vector)?;
    }
    index.build()?;
    Ok(index)
}

/// Run the whole workflow and return the search statistics.
pub fn run(config: &NnConfig) -> Result<RunStats> {
    config.validate()?;
    let t0 = Instant::now();

    let corpus = VectorCorpus::load(&config.input)?;
    info!(elapsed_s = t0.elapsed().as_secs_f64(), "loading dataset");

    // Fail on the query header before spending time on the index.
    let mut queries = VectorReader::open(&config.query)?;
    if queries.dimension() != corpus.dimension() {
        return Err(AnnError::DimensionMismatch {
            expected: corpus.dimension(),
            found: queries.dimension(),
        });
    }

    let t1 = Instant::now();
    let index = build_index(&corpus, config)?;
    write_index(&index, &config.index_path)?;
    let stats = index.stats();
    info!(
        algorithm = stats.algorithm,
        vectors = stats.num_vectors,
        size_bytes = stats.size_bytes,
        elapsed_s = t1.elapsed().as_secs_f64(),
        "indexed"
    );

    info!(
        dimension = queries.dimension(),
        queries = queries.header().count,
        "searching neighbors"
    );
    let mut labels_out = create(&config.output)?;
    let mut distances_out = create(&config.distance_path())?;
    let run_stats = BatchQueryRunner::new(&index, corpus.labels(), config.k, config.batch_size)
        .with_progress_every(config.progress_every)
        .run(&mut queries, &mut labels_out, &mut distances_out)?;

    info!(
        queries = run_stats.queries,
        batches = run_stats.batches,
        short_results = run_stats.short_results,
        search_s = run_stats.elapsed.as_secs_f64(),
        total_s = t0.elapsed().as_secs_f64(),
        "done finding neighbors"
    );
    Ok(run_stats)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| {
        AnnError::Config(format!("{} cannot be opened for writing: {e}", path.display()))
    })?;
    Ok(BufWriter::new(file))
}
