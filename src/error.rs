use std::io;

use thiserror::Error;

use crate::sample::SampleError;
use crate::scale::ScaleError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Data access failed: {0}")]
    DataAccess(String),
    #[error("Layer {0} not found")]
    LayerNotFound(usize),
    #[error("Layer has no spatial reference")]
    MissingSpatialReference,
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error("Failed to write report: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(error: gdal::errors::GdalError) -> Self {
        Error::DataAccess(error.to_string())
    }
}
