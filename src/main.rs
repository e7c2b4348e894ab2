//! `nn`: build an ANN index over word vectors and dump the nearest neighbors
//! of every query vector.

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wordnn::{pipeline, NnConfig};

fn main() {
    init_tracing();

    if let Err(e) = run() {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = NnConfig::parse();
    info!("{config}");

    pipeline::run(&config).with_context(|| {
        format!(
            "nn failed for input {} and query {}",
            config.input.display(),
            config.query.display()
        )
    })?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
