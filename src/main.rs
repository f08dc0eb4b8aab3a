//! gdb-sampler: report on a File Geodatabase layer and sample its features.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use gdb_sampler::config::SessionConfig;
use gdb_sampler::gdal_source::GdalSource;
use gdb_sampler::{logging, report, Result};
use tracing::info;

fn run(config: &SessionConfig) -> Result<()> {
    let source = GdalSource::new(&config.dataset, config.layer, config.field.clone());
    let mut rng = config.rng();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    info!(dataset = %config.dataset.display(), "reading dataset");
    report::list_layers(&source, &mut out)?;
    report::details(&source, &mut out)?;
    report::attribute_index(&source, &mut out)?;
    report::spatial_index(&source, &mut out)?;
    let scale = report::spatial_index_advanced(&source, &mut out)?;
    report::select_random_features(&source, config.sample_size, &mut rng, &mut out)?;
    report::select_random_features_weighted(
        &source,
        &scale,
        config.sample_size,
        config.sampler_config(),
        &mut rng,
        &mut out,
    )?;
    report::select_features_at_locations(&source, &config.locations, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() {
    let config = SessionConfig::parse();

    if let Err(e) = logging::init_logging() {
        eprintln!("Error: Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
