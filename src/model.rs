pub mod entity {
    use std::fmt;
    use std::str::FromStr;

    pub type FeatureId = u64;
    pub type Classification = String;

    /// Point in the native spatial reference of a layer.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Coordinate {
        pub x: f64,
        pub y: f64,
    }

    impl Coordinate {
        pub fn new(x: f64, y: f64) -> Coordinate {
            Coordinate { x, y }
        }
    }

    impl fmt::Display for Coordinate {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{},{}", self.x, self.y)
        }
    }

    impl FromStr for Coordinate {
        type Err = String;

        /// Parses `X,Y`.
        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let (x, y) = s
                .split_once(',')
                .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
            let x = x.trim().parse::<f64>().map_err(|e| format!("invalid X '{}': {}", x, e))?;
            let y = y.trim().parse::<f64>().map_err(|e| format!("invalid Y '{}': {}", y, e))?;
            Ok(Coordinate { x, y })
        }
    }

    /// What a single scan step over a layer yields.
    #[derive(Debug, Clone, PartialEq)]
    pub struct FeatureSummary {
        pub id: FeatureId,
        pub classification: Classification,
        pub size: f64,
    }
}

pub mod report {
    use serde::Serialize;
    use super::entity::{Classification, FeatureId};

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct SampleGeometry {
        #[serde(rename = "GeometryWKT")]
        pub wkt: Option<String>,
        #[serde(rename = "GeometryWGS84WKT")]
        pub wgs84_wkt: Option<String>,
    }

    /// One selected feature as it appears in the JSON report.
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct SampleResult {
        #[serde(rename = "FeatureId")]
        pub feature_id: FeatureId,
        #[serde(rename = "Classification")]
        pub classification: Classification,
        #[serde(rename = "FeatureGeometry")]
        pub geometries: Vec<SampleGeometry>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct Extent {
        pub x_min: f64,
        pub x_max: f64,
        pub y_min: f64,
        pub y_max: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct ColumnInfo {
        pub name: String,
        pub data_type: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct LayerDetails {
        pub shape_type: String,
        pub projection: String,
        pub extent: Extent,
        pub feature_count: u64,
        pub columns: Vec<ColumnInfo>,
    }
}
