//! The seam between the reports and whatever holds the features.
//!
//! [`FeatureSource`] is what the reporting steps need from a GIS dataset.
//! The GDAL backed implementation lives in [`crate::gdal_source`];
//! [`MemorySource`] keeps everything in a `Vec` and treats every geometry as
//! already being in WGS84.

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::entity::{Coordinate, FeatureId, FeatureSummary};
use crate::model::report::{ColumnInfo, Extent, LayerDetails, SampleGeometry, SampleResult};

pub trait FeatureSource {
    fn layer_names(&self) -> Result<Vec<String>>;

    fn layer_details(&self) -> Result<LayerDetails>;

    fn feature_count(&self) -> Result<u64>;

    /// Visits every feature of the layer once, in layer order.
    fn scan_features(&self, visit: &mut dyn FnMut(FeatureSummary)) -> Result<()>;

    /// Resolves sequential positions to report rows, keeping the given order.
    fn samples_by_position(&self, positions: &[usize]) -> Result<Vec<SampleResult>>;

    /// Resolves feature ids to report rows, keeping the given order.
    fn samples_by_id(&self, ids: &[FeatureId]) -> Result<Vec<SampleResult>>;

    /// First feature, in layer order, whose geometry contains each location.
    /// Locations that hit nothing are skipped.
    fn samples_at_locations(&self, locations: &[Coordinate]) -> Result<Vec<SampleResult>>;
}

/// Axis-aligned rectangle standing in for a polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Rect {
    pub fn new(min: Coordinate, max: Coordinate) -> Rect {
        Rect { min, max }
    }

    pub fn area(&self) -> f64 {
        (self.max.x - self.min.x) * (self.max.y - self.min.y)
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn wkt(&self) -> String {
        let (a, b) = (self.min, self.max);
        format!(
            "POLYGON (({} {},{} {},{} {},{} {},{} {}))",
            a.x, a.y, b.x, a.y, b.x, b.y, a.x, b.y, a.x, a.y
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryFeature {
    pub id: FeatureId,
    pub classification: String,
    pub geometry: Option<Rect>,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    layer_name: String,
    features: Vec<MemoryFeature>,
}

impl MemorySource {
    pub fn new(layer_name: impl Into<String>) -> MemorySource {
        MemorySource {
            layer_name: layer_name.into(),
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, id: FeatureId, classification: impl Into<String>, geometry: Option<Rect>) {
        self.features.push(MemoryFeature {
            id,
            classification: classification.into(),
            geometry,
        });
    }

    fn sample(feature: &MemoryFeature) -> SampleResult {
        let wkt = feature.geometry.map(|rect| rect.wkt());
        SampleResult {
            feature_id: feature.id,
            classification: feature.classification.clone(),
            geometries: vec![SampleGeometry {
                wgs84_wkt: wkt.clone(),
                wkt,
            }],
        }
    }
}

impl FeatureSource for MemorySource {
    fn layer_names(&self) -> Result<Vec<String>> {
        Ok(vec![self.layer_name.clone()])
    }

    fn layer_details(&self) -> Result<LayerDetails> {
        let rects = self.features.iter().filter_map(|f| f.geometry);
        let extent = rects.fold(None, |acc: Option<Extent>, r| {
            Some(match acc {
                None => Extent { x_min: r.min.x, x_max: r.max.x, y_min: r.min.y, y_max: r.max.y },
                Some(e) => Extent {
                    x_min: e.x_min.min(r.min.x),
                    x_max: e.x_max.max(r.max.x),
                    y_min: e.y_min.min(r.min.y),
                    y_max: e.y_max.max(r.max.y),
                },
            })
        });
        Ok(LayerDetails {
            shape_type: "Polygon".to_string(),
            projection: "WGS 84".to_string(),
            extent: extent.unwrap_or(Extent { x_min: 0.0, x_max: 0.0, y_min: 0.0, y_max: 0.0 }),
            feature_count: self.features.len() as u64,
            columns: vec![ColumnInfo {
                name: "CODE2012".to_string(),
                data_type: "String".to_string(),
            }],
        })
    }

    fn feature_count(&self) -> Result<u64> {
        Ok(self.features.len() as u64)
    }

    fn scan_features(&self, visit: &mut dyn FnMut(FeatureSummary)) -> Result<()> {
        for feature in &self.features {
            visit(FeatureSummary {
                id: feature.id,
                classification: feature.classification.clone(),
                size: feature.geometry.map_or(0.0, |rect| rect.area()),
            });
        }
        Ok(())
    }

    fn samples_by_position(&self, positions: &[usize]) -> Result<Vec<SampleResult>> {
        positions
            .iter()
            .map(|position| {
                self.features
                    .get(*position)
                    .map(MemorySource::sample)
                    .ok_or_else(|| Error::DataAccess(format!("no feature at position {}", position)))
            })
            .collect()
    }

    fn samples_by_id(&self, ids: &[FeatureId]) -> Result<Vec<SampleResult>> {
        ids.iter()
            .map(|id| {
                self.features
                    .iter()
                    .find(|f| f.id == *id)
                    .map(MemorySource::sample)
                    .ok_or_else(|| Error::DataAccess(format!("no feature with id {}", id)))
            })
            .collect()
    }

    fn samples_at_locations(&self, locations: &[Coordinate]) -> Result<Vec<SampleResult>> {
        let mut results = Vec::new();
        for location in locations {
            let hit = self
                .features
                .iter()
                .find(|f| f.geometry.map_or(false, |rect| rect.contains(location)));
            match hit {
                Some(feature) => results.push(MemorySource::sample(feature)),
                None => debug!(location = %location, "no feature at location"),
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Option<Rect> {
        Some(Rect::new(Coordinate::new(x, y), Coordinate::new(x + w, y + h)))
    }

    #[test]
    fn test_rect_area_and_wkt() {
        let r = Rect::new(Coordinate::new(0.0, 0.0), Coordinate::new(2.0, 3.0));
        assert_eq!(r.area(), 6.0);
        assert_eq!(r.wkt(), "POLYGON ((0 0,2 0,2 3,0 3,0 0))");
        assert!(r.contains(&Coordinate::new(1.0, 1.0)));
        assert!(!r.contains(&Coordinate::new(3.0, 1.0)));
    }

    #[test]
    fn test_memory_source_lookups() {
        let mut source = MemorySource::new("UA_AT");
        source.push(10, "A", rect(0.0, 0.0, 1.0, 1.0));
        source.push(20, "B", None);
        source.push(30, "C", rect(5.0, 5.0, 2.0, 2.0));

        let by_position = source.samples_by_position(&[2, 0]).unwrap();
        assert_eq!(by_position[0].feature_id, 30);
        assert_eq!(by_position[1].feature_id, 10);

        let by_id = source.samples_by_id(&[20]).unwrap();
        assert_eq!(by_id[0].geometries[0].wkt, None);
        assert_eq!(by_id[0].geometries[0].wgs84_wkt, None);

        assert!(source.samples_by_position(&[3]).is_err());
        assert!(source.samples_by_id(&[99]).is_err());

        let hits = source
            .samples_at_locations(&[Coordinate::new(6.0, 6.0), Coordinate::new(100.0, 100.0)])
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].classification, "C");
    }

    #[test]
    fn test_memory_source_details() {
        let mut source = MemorySource::new("UA_AT");
        source.push(1, "A", rect(-1.0, 2.0, 1.0, 1.0));
        source.push(2, "A", rect(4.0, -3.0, 1.0, 1.0));

        let details = source.layer_details().unwrap();
        assert_eq!(details.feature_count, 2);
        assert_eq!(details.extent, Extent { x_min: -1.0, x_max: 5.0, y_min: -3.0, y_max: 3.0 });
    }
}
