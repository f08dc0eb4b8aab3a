//! Inspect an Esri File Geodatabase and draw feature samples from it,
//! either uniformly or weighted by feature area.

pub mod config;
pub mod error;
#[cfg(feature = "gdal")]
pub mod gdal_source;
pub mod logging;
pub mod model;
pub mod report;
pub mod sample;
pub mod scale;
pub mod source;

pub use error::{Error, Result};
pub use sample::{sample_uniform, SampleError, SamplerConfig, WeightedSampler};
pub use scale::{ColumnScale, ColumnValueScale, FeatureScale, ScaleError};
pub use source::{FeatureSource, MemorySource};
