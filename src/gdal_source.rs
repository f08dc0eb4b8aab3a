//! [`FeatureSource`] over an Esri File Geodatabase read through GDAL/OGR.
//!
//! Every operation opens the dataset read-only and drops it before
//! returning, so no cursor outlives the call that created it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::vector::{geometry_type_to_name, Feature, Geometry, Layer, LayerAccess};
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};
use gdal_sys::{OGRFieldType, OSRAxisMappingStrategy};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::entity::{Coordinate, FeatureId, FeatureSummary};
use crate::model::report::{ColumnInfo, Extent, LayerDetails, SampleGeometry, SampleResult};
use crate::source::FeatureSource;

pub const FILE_GDB_DRIVER: &str = "OpenFileGDB";
pub const WGS84_EPSG: u32 = 4326;

/// WGS84 with longitude first, whatever the authority axis order says.
pub fn wgs84() -> Result<SpatialRef> {
    let srs = SpatialRef::from_epsg(WGS84_EPSG)?;
    srs.set_axis_mapping_strategy(OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
    Ok(srs)
}

/// Reprojects `geometry` from `source` to [`wgs84`]. `None` stays `None`.
pub fn to_wgs84(geometry: Option<&Geometry>, source: &SpatialRef) -> Result<Option<Geometry>> {
    let geometry = match geometry {
        Some(geometry) => geometry,
        None => return Ok(None),
    };
    let target = wgs84()?;
    let transform = CoordTransform::new(source, &target)?;
    Ok(Some(geometry.transform(&transform)?))
}

pub fn geometry_wkt(geometry: Option<&Geometry>) -> Result<Option<String>> {
    geometry.map(|g| g.wkt()).transpose().map_err(Error::from)
}

fn field_type_name(field_type: OGRFieldType::Type) -> &'static str {
    match field_type {
        OGRFieldType::OFTInteger => "Integer",
        OGRFieldType::OFTIntegerList => "IntegerList",
        OGRFieldType::OFTReal => "Real",
        OGRFieldType::OFTRealList => "RealList",
        OGRFieldType::OFTString => "String",
        OGRFieldType::OFTStringList => "StringList",
        OGRFieldType::OFTWideString => "WideString",
        OGRFieldType::OFTWideStringList => "WideStringList",
        OGRFieldType::OFTBinary => "Binary",
        OGRFieldType::OFTDate => "Date",
        OGRFieldType::OFTTime => "Time",
        OGRFieldType::OFTDateTime => "DateTime",
        OGRFieldType::OFTInteger64 => "Integer64",
        OGRFieldType::OFTInteger64List => "Integer64List",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone)]
pub struct GdalSource {
    path: PathBuf,
    layer_index: usize,
    classification_field: String,
}

impl GdalSource {
    pub fn new(path: impl AsRef<Path>, layer_index: usize, classification_field: impl Into<String>) -> GdalSource {
        GdalSource {
            path: path.as_ref().to_path_buf(),
            layer_index,
            classification_field: classification_field.into(),
        }
    }

    fn open(&self) -> Result<Dataset> {
        let options = DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_VECTOR | GdalOpenFlags::GDAL_OF_READONLY,
            allowed_drivers: Some(&[FILE_GDB_DRIVER]),
            ..Default::default()
        };
        debug!(path = %self.path.display(), "opening dataset");
        Ok(Dataset::open_ex(&self.path, options)?)
    }

    fn layer<'d>(&self, dataset: &'d Dataset) -> Result<Layer<'d>> {
        dataset
            .layers()
            .nth(self.layer_index)
            .ok_or(Error::LayerNotFound(self.layer_index))
    }

    fn spatial_ref(layer: &Layer) -> Result<SpatialRef> {
        layer.spatial_ref().ok_or(Error::MissingSpatialReference)
    }

    fn classification(&self, feature: &Feature) -> Result<String> {
        Ok(feature
            .field_as_string_by_name(&self.classification_field)?
            .unwrap_or_default())
    }

    fn sample(&self, feature: &Feature, source: &SpatialRef) -> Result<SampleResult> {
        let feature_id = feature
            .fid()
            .ok_or_else(|| Error::DataAccess("feature without id".to_string()))?;
        let geometry = feature.geometry();
        // TODO: store a single geometry when the layer is already in WGS84
        let wgs84 = to_wgs84(geometry, source)?;
        Ok(SampleResult {
            feature_id,
            classification: self.classification(feature)?,
            geometries: vec![SampleGeometry {
                wkt: geometry_wkt(geometry)?,
                wgs84_wkt: geometry_wkt(wgs84.as_ref())?,
            }],
        })
    }
}

impl FeatureSource for GdalSource {
    fn layer_names(&self) -> Result<Vec<String>> {
        let dataset = self.open()?;
        Ok(dataset.layers().map(|layer| layer.name()).collect())
    }

    fn layer_details(&self) -> Result<LayerDetails> {
        let dataset = self.open()?;
        let layer = self.layer(&dataset)?;

        let shape_type = layer
            .defn()
            .geom_fields()
            .next()
            .map(|field| geometry_type_to_name(field.field_type()))
            .unwrap_or_else(|| "None".to_string());
        let projection = GdalSource::spatial_ref(&layer)?.name()?;
        let envelope = layer.get_extent()?;
        let columns = layer
            .defn()
            .fields()
            .map(|field| ColumnInfo {
                name: field.name(),
                data_type: field_type_name(field.field_type()).to_string(),
            })
            .collect();

        Ok(LayerDetails {
            shape_type,
            projection,
            extent: Extent {
                x_min: envelope.MinX,
                x_max: envelope.MaxX,
                y_min: envelope.MinY,
                y_max: envelope.MaxY,
            },
            feature_count: layer.feature_count(),
            columns,
        })
    }

    fn feature_count(&self) -> Result<u64> {
        let dataset = self.open()?;
        Ok(self.layer(&dataset)?.feature_count())
    }

    fn scan_features(&self, visit: &mut dyn FnMut(FeatureSummary)) -> Result<()> {
        let dataset = self.open()?;
        let mut layer = self.layer(&dataset)?;
        for feature in layer.features() {
            let id = match feature.fid() {
                Some(id) => id,
                None => {
                    warn!("skipping feature without id");
                    continue;
                }
            };
            visit(FeatureSummary {
                id,
                classification: self.classification(&feature)?,
                size: feature.geometry().map_or(0.0, |geometry| geometry.area()),
            });
        }
        Ok(())
    }

    fn samples_by_position(&self, positions: &[usize]) -> Result<Vec<SampleResult>> {
        let dataset = self.open()?;
        let mut layer = self.layer(&dataset)?;
        let source = GdalSource::spatial_ref(&layer)?;

        let wanted: HashSet<usize> = positions.iter().copied().collect();
        let mut found = HashMap::with_capacity(wanted.len());
        for (position, feature) in layer.features().enumerate() {
            if wanted.contains(&position) {
                found.insert(position, self.sample(&feature, &source)?);
                if found.len() == wanted.len() {
                    break;
                }
            }
        }

        positions
            .iter()
            .map(|position| {
                found
                    .get(position)
                    .cloned()
                    .ok_or_else(|| Error::DataAccess(format!("no feature at position {}", position)))
            })
            .collect()
    }

    fn samples_by_id(&self, ids: &[FeatureId]) -> Result<Vec<SampleResult>> {
        let dataset = self.open()?;
        let layer = self.layer(&dataset)?;
        let source = GdalSource::spatial_ref(&layer)?;
        ids.iter()
            .map(|id| {
                let feature = layer
                    .feature(*id)
                    .ok_or_else(|| Error::DataAccess(format!("no feature with id {}", id)))?;
                self.sample(&feature, &source)
            })
            .collect()
    }

    fn samples_at_locations(&self, locations: &[Coordinate]) -> Result<Vec<SampleResult>> {
        let dataset = self.open()?;
        let mut layer = self.layer(&dataset)?;
        let source = GdalSource::spatial_ref(&layer)?;

        let mut results = Vec::new();
        for location in locations {
            let point = Geometry::from_wkt(&format!("POINT ({} {})", location.x, location.y))?;
            layer.set_spatial_filter(&point);
            layer.reset_feature_reading();
            let hit = layer
                .features()
                .find(|feature| feature.geometry().map_or(false, |geometry| geometry.intersects(&point)));
            match hit {
                Some(feature) => results.push(self.sample(&feature, &source)?),
                None => debug!(location = %location, "no feature at location"),
            }
            layer.clear_spatial_filter();
        }
        Ok(results)
    }
}
