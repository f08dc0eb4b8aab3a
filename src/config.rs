//! Command line configuration for one sampling session.

use std::path::PathBuf;

use clap::Parser;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::model::entity::Coordinate;
use crate::sample::SamplerConfig;

pub const DEFAULT_DATASET: &str = "data/UA_AT.gdb.zip";
pub const DEFAULT_CLASSIFICATION_FIELD: &str = "CODE2012";
/// Vienna town hall in ETRS89-LAEA (EPSG:3035).
pub const DEFAULT_LOCATION: &str = "4793000,2809000";

#[derive(Debug, Clone, Parser)]
#[command(name = "gdb-sampler")]
#[command(about = "Inspect and sample the features of an Esri File Geodatabase", long_about = None)]
pub struct SessionConfig {
    /// File geodatabase to read (directory or .gdb.zip)
    #[arg(default_value = DEFAULT_DATASET)]
    pub dataset: PathBuf,

    /// Index of the layer to inspect
    #[arg(long, default_value_t = 0)]
    pub layer: usize,

    /// Attribute holding the classification code
    #[arg(long, default_value = DEFAULT_CLASSIFICATION_FIELD)]
    pub field: String,

    /// Number of features drawn by each sampler
    #[arg(long, default_value_t = 3)]
    pub sample_size: usize,

    /// Seed for reproducible draws (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Location to look up as X,Y in the layer's spatial reference (repeatable)
    #[arg(long = "location", default_value = DEFAULT_LOCATION)]
    pub locations: Vec<Coordinate>,

    /// Redraws inside a chosen classification before a weighted draw is given up
    #[arg(long, default_value_t = 64)]
    pub max_feature_retries: usize,
}

impl SessionConfig {
    pub fn rng(&self) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        }
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            max_feature_retries: self.max_feature_retries,
            ..SamplerConfig::default()
        }
    }
}
