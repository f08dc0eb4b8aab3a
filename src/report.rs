//! The console reports, each a read-only pass over a [`FeatureSource`].

use std::collections::HashMap;
use std::io::Write;

use itertools::Itertools;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::model::entity::{Coordinate, FeatureSummary};
use crate::model::report::SampleResult;
use crate::sample::{sample_uniform, SamplerConfig, WeightedSampler};
use crate::scale::{ColumnScale, FeatureScale, ScaleError};
use crate::source::FeatureSource;

/// `0.1234` renders as `12.34%`.
pub fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn write_json<W: Write + ?Sized, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writeln!(out, "{}", json)?;
    Ok(())
}

pub fn list_layers<S, W>(source: &S, out: &mut W) -> Result<()>
where
    S: FeatureSource + ?Sized,
    W: Write + ?Sized,
{
    for name in source.layer_names()? {
        writeln!(out, "Layer: {}", name)?;
    }
    Ok(())
}

pub fn details<S, W>(source: &S, out: &mut W) -> Result<()>
where
    S: FeatureSource + ?Sized,
    W: Write + ?Sized,
{
    let details = source.layer_details()?;
    writeln!(out, "Shape Type: {}", details.shape_type)?;
    writeln!(out, "Projection: {}", details.projection)?;
    write!(out, "Extent: ")?;
    write_json(out, &details.extent)?;
    writeln!(out, "Feature Count: {}", details.feature_count)?;
    write!(out, "Columns: ")?;
    write_json(out, &details.columns)?;
    Ok(())
}

/// Occurrences per classification, sorted by classification.
pub fn attribute_counts<S: FeatureSource + ?Sized>(source: &S) -> Result<Vec<(String, usize)>> {
    let mut classifications = Vec::new();
    source.scan_features(&mut |feature: FeatureSummary| classifications.push(feature.classification))?;
    Ok(classifications.into_iter().counts().into_iter().sorted().collect())
}

pub fn attribute_index<S, W>(source: &S, out: &mut W) -> Result<()>
where
    S: FeatureSource + ?Sized,
    W: Write + ?Sized,
{
    info!("building attribute index");
    for (classification, count) in attribute_counts(source)? {
        writeln!(out, "Classification {} occurs {:>5} times.", classification, count)?;
    }
    Ok(())
}

/// Share of the total area per classification, sorted by classification.
pub fn area_fractions<S: FeatureSource + ?Sized>(source: &S) -> Result<Vec<(String, f64)>> {
    let mut areas: HashMap<String, f64> = HashMap::new();
    source.scan_features(&mut |feature: FeatureSummary| {
        *areas.entry(feature.classification).or_insert(0.0) += feature.size;
    })?;

    let total: f64 = areas.values().sum();
    if total <= 0.0 || total.is_nan() {
        return Err(ScaleError::degenerate("layer has no area").into());
    }
    Ok(areas
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|(classification, area)| (classification, area / total))
        .collect())
}

pub fn spatial_index<S, W>(source: &S, out: &mut W) -> Result<()>
where
    S: FeatureSource + ?Sized,
    W: Write + ?Sized,
{
    info!("building spatial index");
    for (classification, fraction) in area_fractions(source)? {
        writeln!(
            out,
            "Classification {} occupies {:>7} of the total area.",
            classification,
            percent(fraction)
        )?;
    }
    Ok(())
}

/// Scans the layer once and returns the finalized area-weighted index.
pub fn build_column_scale<S: FeatureSource + ?Sized>(source: &S) -> Result<ColumnScale<String>> {
    let mut scale = ColumnScale::new();
    source.scan_features(&mut |feature: FeatureSummary| {
        scale.add_feature(feature.classification, FeatureScale::new(feature.id, feature.size));
    })?;
    scale.finalize()?;
    info!(
        groups = scale.len(),
        features = scale.feature_count(),
        "finalized column scale"
    );
    Ok(scale)
}

pub fn spatial_index_advanced<S, W>(source: &S, out: &mut W) -> Result<ColumnScale<String>>
where
    S: FeatureSource + ?Sized,
    W: Write + ?Sized,
{
    let scale = build_column_scale(source)?;
    for (classification, group) in scale.groups() {
        writeln!(
            out,
            "Classification {} has an aggregated scale limit of {:>8}.",
            classification,
            percent(group.probability_limit()?)
        )?;
    }
    Ok(scale)
}

/// Uniform sample of `n` features, by position in the layer.
pub fn select_random_features<S, W, R>(source: &S, n: usize, rng: &mut R, out: &mut W) -> Result<Vec<SampleResult>>
where
    S: FeatureSource + ?Sized,
    W: Write + ?Sized,
    R: Rng + ?Sized,
{
    info!(sample_size = n, "selecting random features");
    let count = source.feature_count()? as usize;
    let positions = sample_uniform(count, n, rng)?;
    let results = source.samples_by_position(&positions)?;
    write_json(out, &results)?;
    Ok(results)
}

/// Area-weighted sample of `n` features drawn from `scale`.
pub fn select_random_features_weighted<S, W, R>(
    source: &S,
    scale: &ColumnScale<String>,
    n: usize,
    config: SamplerConfig,
    rng: &mut R,
    out: &mut W,
) -> Result<Vec<SampleResult>>
where
    S: FeatureSource + ?Sized,
    W: Write + ?Sized,
    R: Rng + ?Sized,
{
    info!(sample_size = n, "selecting weighted random features");
    let mut sampler = WeightedSampler::new(scale, config)?;
    let ids = sampler.sample(n, rng)?;
    let results = source.samples_by_id(&ids)?;
    write_json(out, &results)?;
    Ok(results)
}

pub fn select_features_at_locations<S, W>(source: &S, locations: &[Coordinate], out: &mut W) -> Result<Vec<SampleResult>>
where
    S: FeatureSource + ?Sized,
    W: Write + ?Sized,
{
    info!(locations = locations.len(), "selecting features at locations");
    let results = source.samples_at_locations(locations)?;
    write_json(out, &results)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, Rect};

    fn source() -> MemorySource {
        let mut source = MemorySource::new("UA_AT");
        let square = |x: f64, side: f64| Some(Rect::new(Coordinate::new(x, 0.0), Coordinate::new(x + side, side)));
        source.push(1, "21000", square(0.0, 1.0));
        source.push(2, "11100", square(10.0, 3.0));
        source.push(3, "21000", square(20.0, 1.0));
        source
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.25), "25.00%");
        assert_eq!(percent(1.0), "100.00%");
        assert_eq!(format!("{:>8}", percent(0.05)), "   5.00%");
    }

    #[test]
    fn test_attribute_index_sorted_by_key() {
        let mut out = Vec::new();
        attribute_index(&source(), &mut out).unwrap();
        assert_eq!(
            text(out),
            "Classification 11100 occurs     1 times.\nClassification 21000 occurs     2 times.\n"
        );
    }

    #[test]
    fn test_area_fractions() {
        let fractions = area_fractions(&source()).unwrap();
        assert_eq!(fractions[0].0, "11100");
        assert!((fractions[0].1 - 9.0 / 11.0).abs() < 1e-9);
        assert!((fractions[1].1 - 2.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_area_fractions_of_empty_layer_fail() {
        assert!(area_fractions(&MemorySource::new("empty")).is_err());
    }

    #[test]
    fn test_spatial_index_advanced_keeps_insertion_order() {
        let mut out = Vec::new();
        let scale = spatial_index_advanced(&source(), &mut out).unwrap();
        assert_eq!(scale.len(), 2);
        let lines: Vec<String> = text(out).lines().map(String::from).collect();
        assert_eq!(lines[0], "Classification 21000 has an aggregated scale limit of   18.18%.");
        assert_eq!(lines[1], "Classification 11100 has an aggregated scale limit of  100.00%.");
    }

    #[test]
    fn test_details_prints_json_blocks() {
        let mut out = Vec::new();
        details(&source(), &mut out).unwrap();
        let out = text(out);
        assert!(out.starts_with("Shape Type: Polygon\nProjection: WGS 84\nExtent: {\n"));
        assert!(out.contains("\"XMin\": 0.0"));
        assert!(out.contains("Feature Count: 3\n"));
        assert!(out.contains("\"Name\": \"CODE2012\""));
        assert!(out.contains("\"DataType\": \"String\""));
    }

    #[test]
    fn test_list_layers() {
        let mut out = Vec::new();
        list_layers(&source(), &mut out).unwrap();
        assert_eq!(text(out), "Layer: UA_AT\n");
    }
}
