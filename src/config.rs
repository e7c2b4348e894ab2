//! Command-line configuration of the `nn` tool.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::warn;

use crate::ann::FactoryOptions;
use crate::distance::DistanceMetric;
use crate::error::{AnnError, Result};

/// Recommended range for links per vector; outside it still works.
const RECOMMENDED_LINKS: std::ops::RangeInclusive<usize> = 4..=64;

/// Build an ANN index over word vectors and write the K nearest neighbors of
/// every query vector.
///
/// Neighbor labels go to OUTPUT, one line per query; their distances go to
/// OUTPUT.distance in the same layout.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "nn")]
#[command(author, version, about, long_about = None)]
pub struct NnConfig {
    /// Vectors to index, in word2vec text format
    #[arg(long)]
    pub input: PathBuf,

    /// Query vectors, in word2vec text format
    #[arg(long)]
    pub query: PathBuf,

    /// Output path for neighbor labels
    #[arg(long)]
    pub output: PathBuf,

    /// Where to store the built index
    #[arg(long, alias = "indexPath")]
    pub index_path: PathBuf,

    /// Number of neighbors to search
    #[arg(short = 'K', long = "k", default_value_t = 300)]
    pub k: usize,

    /// Size of a query batch
    #[arg(long, alias = "batchSize", default_value_t = 10_000)]
    pub batch_size: usize,

    /// Index factory string (`hnswcustom`, `HNSW32`, `Flat`, `IVF4096,PQ32`, ...)
    #[arg(long, alias = "indexKey", default_value = crate::ann::factory::CUSTOM_HNSW_KEY)]
    pub index_key: String,

    /// Links per vector for `hnswcustom`; 4 <= x <= 64, higher is more accurate but uses more RAM
    #[arg(long, alias = "linksPerVector", default_value_t = 8)]
    pub links_per_vector: usize,

    /// Construction beam width for `hnswcustom`
    #[arg(long, alias = "efConstruction", default_value_t = 26)]
    pub ef_construction: usize,

    /// Search beam width for `hnswcustom`; speed/accuracy tradeoff
    #[arg(long, alias = "efSearch", default_value_t = 64)]
    pub ef_search: usize,

    /// Distance metric
    #[arg(long, value_enum, default_value_t = DistanceMetric::L2)]
    pub metric: DistanceMetric,

    /// Inverted lists probed per query by IVF indexes
    #[arg(long, default_value_t = 1)]
    pub nprobe: usize,

    /// Seed for level draws and k-means, for reproducible indexes
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log progress every this many queries
    #[arg(long, default_value_t = 1_000_000)]
    pub progress_every: usize,
}

impl NnConfig {
    /// Config with the given paths and every other value at its default.
    pub fn with_paths(
        input: impl Into<PathBuf>,
        query: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            query: query.into(),
            output: output.into(),
            index_path: index_path.into(),
            k: 300,
            batch_size: 10_000,
            index_key: crate::ann::factory::CUSTOM_HNSW_KEY.to_string(),
            links_per_vector: 8,
            ef_construction: 26,
            ef_search: 64,
            metric: DistanceMetric::L2,
            nprobe: 1,
            seed: None,
            progress_every: 1_000_000,
        }
    }

    /// Check values clap cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        for (flag, path) in [
            ("--input", &self.input),
            ("--query", &self.query),
            ("--output", &self.output),
            ("--index-path", &self.index_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(AnnError::Config(format!("{flag} must not be empty")));
            }
        }
        if self.k == 0 {
            return Err(AnnError::Config("-K must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(AnnError::Config(
                "--batch-size must be at least 1".to_string(),
            ));
        }
        if self.index_key.trim().is_empty() {
            return Err(AnnError::Config("--index-key must not be empty".to_string()));
        }
        if self.links_per_vector < 2 {
            return Err(AnnError::Config(format!(
                "--links-per-vector must be at least 2, got {}",
                self.links_per_vector
            )));
        }
        if !RECOMMENDED_LINKS.contains(&self.links_per_vector) {
            warn!(
                links_per_vector = self.links_per_vector,
                "links per vector outside the recommended 4..=64 range"
            );
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(AnnError::Config(
                "--ef-construction and --ef-search must be at least 1".to_string(),
            ));
        }
        if self.nprobe == 0 {
            return Err(AnnError::Config("--nprobe must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Path of the distances file: the output path with `.distance` appended.
    pub fn distance_path(&self) -> PathBuf {
        distance_path(&self.output)
    }

    pub fn factory_options(&self) -> FactoryOptions {
        FactoryOptions {
            links_per_vector: self.links_per_vector,
            ef_construction: self.ef_construction,
            ef_search: self.ef_search,
            metric: self.metric,
            nprobe: self.nprobe,
            seed: self.seed,
        }
    }
}

/// `<output>.distance`
pub fn distance_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".distance");
    PathBuf::from(name)
}

impl fmt::Display for NnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Initialized args:")?;
        writeln!(f, "input: {}", self.input.display())?;
        writeln!(f, "output: {}", self.output.display())?;
        writeln!(f, "query: {}", self.query.display())?;
        writeln!(f, "indexPath: {}", self.index_path.display())?;
        writeln!(f, "K: {}", self.k)?;
        writeln!(f, "batchSize: {}", self.batch_size)?;
        writeln!(f, "indexKey: {}", self.index_key)?;
        writeln!(f, "linksPerVector: {}", self.links_per_vector)?;
        writeln!(f, "efConstruction: {}", self.ef_construction)?;
        writeln!(f, "efSearch: {}", self.ef_search)?;
        writeln!(f, "metric: {}", self.metric)?;
        writeln!(f, "nprobe: {}", self.nprobe)?;
        match self.seed {
            Some(seed) => writeln!(f, "seed: {seed}")?,
            None => writeln!(f, "seed: random")?,
        }
        write!(f, "progressEvery: {}", self.progress_every)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "nn", "--input", "a.txt", "--query", "q.txt", "--output", "out", "--index-path", "idx",
    ];

    #[test]
    fn defaults_match_the_documented_values() {
        let config = NnConfig::try_parse_from(REQUIRED).unwrap();
        assert_eq!(config, NnConfig::with_paths("a.txt", "q.txt", "out", "idx"));
        config.validate().unwrap();
    }

    #[test]
    fn parses_every_flag() {
        let mut args = REQUIRED.to_vec();
        args.extend([
            "-K", "5", "--batch-size", "7", "--index-key", "HNSW32", "--links-per-vector", "12",
            "--ef-construction", "80", "--ef-search", "20", "--metric", "cosine", "--nprobe",
            "4", "--seed", "99", "--progress-every", "10",
        ]);
        let config = NnConfig::try_parse_from(args).unwrap();
        assert_eq!(config.k, 5);
        assert_eq!(config.batch_size, 7);
        assert_eq!(config.index_key, "HNSW32");
        assert_eq!(config.links_per_vector, 12);
        assert_eq!(config.ef_construction, 80);
        assert_eq!(config.ef_search, 20);
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert_eq!(config.nprobe, 4);
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.progress_every, 10);
    }

    #[test]
    fn accepts_camel_case_aliases() {
        let config = NnConfig::try_parse_from([
            "nn", "--input", "a", "--query", "q", "--output", "o", "--indexPath", "i",
            "--batchSize", "3", "--linksPerVector", "16",
        ])
        .unwrap();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.links_per_vector, 16);
    }

    #[test]
    fn missing_required_flag_is_rejected() {
        assert!(NnConfig::try_parse_from(["nn", "--input", "a.txt"]).is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let base = NnConfig::with_paths("a", "q", "o", "i");

        let empty = NnConfig {
            query: PathBuf::new(),
            ..base.clone()
        };
        assert!(matches!(empty.validate(), Err(AnnError::Config(_))));

        for bad in [
            NnConfig { k: 0, ..base.clone() },
            NnConfig { batch_size: 0, ..base.clone() },
            NnConfig { links_per_vector: 1, ..base.clone() },
            NnConfig { ef_search: 0, ..base.clone() },
            NnConfig { nprobe: 0, ..base.clone() },
            NnConfig { index_key: " ".to_string(), ..base.clone() },
        ] {
            assert!(bad.validate().is_err(), "{bad:?}");
        }

        // Outside the recommended range only warns.
        NnConfig { links_per_vector: 100, ..base }.validate().unwrap();
    }

    #[test]
    fn display_dumps_every_value() {
        let text = NnConfig::with_paths("a", "q", "o", "i").to_string();
        assert!(text.starts_with("Initialized args:\n"));
        for needle in ["K: 300", "batchSize: 10000", "indexKey: hnswcustom", "efSearch: 64"] {
            assert!(text.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn distance_file_appends_suffix() {
        let config = NnConfig::with_paths("a", "q", "out/nn.txt", "i");
        assert_eq!(config.distance_path(), PathBuf::from("out/nn.txt.distance"));
    }
}
