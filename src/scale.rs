//! Two-level cumulative probability index over classified features.
//!
//! Features are accumulated with [`ColumnScale::add_feature`] and the derived
//! sizes and probability limits are computed by a single
//! [`ColumnScale::finalize`] pass. Both levels keep encounter order, which is
//! the order the samplers walk when looking for the first limit above a draw.

use std::collections::HashMap;
use std::hash::Hash;

use thiserror::Error;

use crate::model::entity::FeatureId;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScaleError {
    #[error("Degenerate index: {reason}")]
    Degenerate { reason: String },
    #[error("Probability limits queried before finalize")]
    NotFinalized,
}

impl ScaleError {
    pub(crate) fn degenerate(reason: impl Into<String>) -> ScaleError {
        ScaleError::Degenerate { reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScale {
    pub feature_id: FeatureId,
    pub size: f64,
    probability_limit: Option<f64>,
}

impl FeatureScale {
    pub fn new(feature_id: FeatureId, size: f64) -> FeatureScale {
        FeatureScale { feature_id, size, probability_limit: None }
    }

    /// Cumulative mass of this feature and every earlier member of its group.
    pub fn probability_limit(&self) -> Result<f64, ScaleError> {
        self.probability_limit.ok_or(ScaleError::NotFinalized)
    }
}

/// All features sharing one classification key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnValueScale {
    features: Vec<FeatureScale>,
    column_value_size: f64,
    probability_limit: Option<f64>,
    finalized: bool,
}

impl ColumnValueScale {
    pub fn new() -> ColumnValueScale {
        ColumnValueScale::default()
    }

    pub fn add(&mut self, feature: FeatureScale) {
        self.invalidate();
        self.features.push(feature);
    }

    fn invalidate(&mut self) {
        if self.finalized {
            self.features.iter_mut().for_each(|f| f.probability_limit = None);
            self.probability_limit = None;
            self.finalized = false;
        }
    }

    pub fn features(&self) -> &[FeatureScale] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Sum of member sizes as of the last `finalize`.
    pub fn column_value_size(&self) -> Result<f64, ScaleError> {
        if self.finalized {
            Ok(self.column_value_size)
        } else {
            Err(ScaleError::NotFinalized)
        }
    }

    /// Cumulative mass of this group and every earlier group of the index.
    pub fn probability_limit(&self) -> Result<f64, ScaleError> {
        self.probability_limit.ok_or(ScaleError::NotFinalized)
    }

    pub fn finalize(&mut self) -> Result<(), ScaleError> {
        if self.features.is_empty() {
            return Err(ScaleError::degenerate("group has no features"));
        }
        if let Some(bad) = self.features.iter().find(|f| !f.size.is_finite() || f.size < 0.0) {
            return Err(ScaleError::degenerate(format!(
                "feature {} has invalid size {}",
                bad.feature_id, bad.size
            )));
        }
        let column_value_size: f64 = self.features.iter().map(|f| f.size).sum();
        if column_value_size <= 0.0 {
            return Err(ScaleError::degenerate("group has zero total size"));
        }

        let mut limit = 0.0;
        for feature in self.features.iter_mut() {
            limit += feature.size / column_value_size;
            feature.probability_limit = Some(limit);
        }
        self.column_value_size = column_value_size;
        self.finalized = true;
        Ok(())
    }

    /// First member, in insertion order, whose limit exceeds `draw` and which
    /// is accepted by `eligible`. Limits are non-decreasing, so this is also
    /// the member with the smallest qualifying limit.
    pub(crate) fn find_feature<F>(&self, draw: f64, eligible: F) -> Option<&FeatureScale>
    where
        F: Fn(&FeatureScale) -> bool,
    {
        let start = self
            .features
            .partition_point(|f| f.probability_limit.map_or(true, |limit| limit <= draw));
        self.features[start..].iter().find(|f| eligible(*f))
    }
}

/// Index from classification key to its group, in first-insertion order.
#[derive(Debug, Clone)]
pub struct ColumnScale<K> {
    groups: Vec<(K, ColumnValueScale)>,
    positions: HashMap<K, usize>,
    total_size: f64,
    finalized: bool,
}

impl<K> Default for ColumnScale<K> {
    fn default() -> Self {
        ColumnScale {
            groups: Vec::new(),
            positions: HashMap::new(),
            total_size: 0.0,
            finalized: false,
        }
    }
}

impl<K: Eq + Hash + Clone> ColumnScale<K> {
    pub fn new() -> ColumnScale<K> {
        ColumnScale::default()
    }

    pub fn add_feature(&mut self, key: K, feature: FeatureScale) {
        let index = match self.positions.get(&key) {
            Some(index) => *index,
            None => {
                self.groups.push((key.clone(), ColumnValueScale::new()));
                self.positions.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        if self.finalized {
            self.groups.iter_mut().for_each(|(_, group)| group.invalidate());
            self.finalized = false;
        }
        self.groups[index].1.add(feature);
    }

    pub fn finalize(&mut self) -> Result<(), ScaleError> {
        if self.groups.is_empty() {
            return Err(ScaleError::degenerate("index has no features"));
        }
        // group sizes are needed for the dataset-level limits
        for (_, group) in self.groups.iter_mut() {
            group.finalize()?;
        }

        let total_size: f64 = self.groups.iter().map(|(_, g)| g.column_value_size).sum();
        let mut limit = 0.0;
        for (_, group) in self.groups.iter_mut() {
            limit += group.column_value_size / total_size;
            group.probability_limit = Some(limit);
        }
        self.total_size = total_size;
        self.finalized = true;
        Ok(())
    }

    pub fn group(&self, key: &K) -> Option<&ColumnValueScale> {
        self.positions.get(key).map(|index| &self.groups[*index].1)
    }

    /// Groups in first-insertion order.
    pub fn groups(&self) -> impl Iterator<Item = (&K, &ColumnValueScale)> {
        self.groups.iter().map(|(key, group)| (key, group))
    }

    pub fn total_size(&self) -> Result<f64, ScaleError> {
        if self.finalized {
            Ok(self.total_size)
        } else {
            Err(ScaleError::NotFinalized)
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.groups.iter().map(|(_, g)| g.len()).sum()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Same search as [`ColumnValueScale::find_feature`] at group level.
    pub(crate) fn find_group<F>(&self, draw: f64, eligible: F) -> Option<(usize, &ColumnValueScale)>
    where
        F: Fn(usize, &ColumnValueScale) -> bool,
    {
        let start = self
            .groups
            .partition_point(|(_, g)| g.probability_limit.map_or(true, |limit| limit <= draw));
        self.groups[start..]
            .iter()
            .enumerate()
            .map(|(offset, (_, group))| (start + offset, group))
            .find(|(index, group)| eligible(*index, *group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn scale_from(groups: Vec<(&str, Vec<f64>)>) -> ColumnScale<String> {
        let mut scale = ColumnScale::new();
        let mut id = 0;
        for (key, sizes) in groups {
            for size in sizes {
                scale.add_feature(key.to_string(), FeatureScale::new(id, size));
                id += 1;
            }
        }
        scale
    }

    #[test]
    fn test_two_groups_limits() {
        let mut scale = scale_from(vec![("A", vec![10.0]), ("B", vec![30.0])]);
        scale.finalize().unwrap();

        let a = scale.group(&"A".to_string()).unwrap();
        let b = scale.group(&"B".to_string()).unwrap();
        assert!((a.probability_limit().unwrap() - 0.25).abs() < EPSILON);
        assert!((b.probability_limit().unwrap() - 1.0).abs() < EPSILON);
        assert!((a.features()[0].probability_limit().unwrap() - 1.0).abs() < EPSILON);
        assert!((b.features()[0].probability_limit().unwrap() - 1.0).abs() < EPSILON);
        assert!((scale.total_size().unwrap() - 40.0).abs() < EPSILON);
    }

    #[test]
    fn test_limits_non_decreasing_and_terminal_one() {
        let mut scale = scale_from(vec![
            ("12100", vec![3.5, 0.25, 7.0, 1.0]),
            ("11210", vec![0.1]),
            ("50000", vec![12.0, 12.0, 0.001]),
        ]);
        scale.finalize().unwrap();

        let group_limits: Vec<f64> = scale
            .groups()
            .map(|(_, g)| g.probability_limit().unwrap())
            .collect();
        assert!(group_limits.windows(2).all(|w| w[0] <= w[1]));
        assert!((group_limits.last().unwrap() - 1.0).abs() < EPSILON);

        for (_, group) in scale.groups() {
            let limits: Vec<f64> = group
                .features()
                .iter()
                .map(|f| f.probability_limit().unwrap())
                .collect();
            assert!(limits.windows(2).all(|w| w[0] <= w[1]));
            assert!((limits.last().unwrap() - 1.0).abs() < EPSILON);
        }
    }

    #[test]
    fn test_feature_increments_match_share_of_group() {
        let mut group = ColumnValueScale::new();
        for (id, size) in [2.0, 5.0, 3.0].iter().enumerate() {
            group.add(FeatureScale::new(id as FeatureId, *size));
        }
        group.finalize().unwrap();

        let total = group.column_value_size().unwrap();
        assert!((total - 10.0).abs() < EPSILON);
        let mut previous = 0.0;
        for feature in group.features() {
            let limit = feature.probability_limit().unwrap();
            assert!((limit - previous - feature.size / total).abs() < EPSILON);
            previous = limit;
        }
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut scale = scale_from(vec![("Z", vec![1.0]), ("A", vec![1.0]), ("M", vec![1.0])]);
        scale.add_feature("Z".to_string(), FeatureScale::new(10, 1.0));
        scale.finalize().unwrap();

        let keys: Vec<&String> = scale.groups().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Z", "A", "M"]);
        assert_eq!(scale.group(&"Z".to_string()).unwrap().len(), 2);
        assert_eq!(scale.feature_count(), 4);
    }

    #[test]
    fn test_query_before_finalize_fails() {
        let scale = scale_from(vec![("A", vec![1.0])]);
        let group = scale.group(&"A".to_string()).unwrap();
        assert_eq!(group.probability_limit(), Err(ScaleError::NotFinalized));
        assert_eq!(group.features()[0].probability_limit(), Err(ScaleError::NotFinalized));
        assert_eq!(scale.total_size(), Err(ScaleError::NotFinalized));
    }

    #[test]
    fn test_add_after_finalize_resets_state() {
        let mut scale = scale_from(vec![("A", vec![1.0])]);
        scale.finalize().unwrap();
        assert!(scale.is_finalized());

        scale.add_feature("B".to_string(), FeatureScale::new(7, 1.0));
        assert!(!scale.is_finalized());
        let a = scale.group(&"A".to_string()).unwrap();
        assert_eq!(a.probability_limit(), Err(ScaleError::NotFinalized));
        assert_eq!(a.features()[0].probability_limit(), Err(ScaleError::NotFinalized));
    }

    #[test]
    fn test_empty_index_is_degenerate() {
        let mut scale: ColumnScale<String> = ColumnScale::new();
        assert!(matches!(scale.finalize(), Err(ScaleError::Degenerate { .. })));

        let mut group = ColumnValueScale::new();
        assert!(matches!(group.finalize(), Err(ScaleError::Degenerate { .. })));
    }

    #[test]
    fn test_zero_and_invalid_sizes_are_degenerate() {
        let mut scale = scale_from(vec![("A", vec![0.0, 0.0]), ("B", vec![1.0])]);
        assert!(matches!(scale.finalize(), Err(ScaleError::Degenerate { .. })));

        let mut scale = scale_from(vec![("A", vec![f64::NAN])]);
        assert!(matches!(scale.finalize(), Err(ScaleError::Degenerate { .. })));

        let mut scale = scale_from(vec![("A", vec![-1.0, 2.0])]);
        assert!(matches!(scale.finalize(), Err(ScaleError::Degenerate { .. })));
    }

    #[test]
    fn test_find_group_skips_ineligible() {
        let mut scale = scale_from(vec![("A", vec![1.0]), ("B", vec![1.0]), ("C", vec![2.0])]);
        scale.finalize().unwrap();

        let (index, _) = scale.find_group(0.1, |_, _| true).unwrap();
        assert_eq!(index, 0);
        let (index, _) = scale.find_group(0.3, |_, _| true).unwrap();
        assert_eq!(index, 1);
        let (index, _) = scale.find_group(0.1, |i, _| i != 0).unwrap();
        assert_eq!(index, 1);
        assert!(scale.find_group(0.6, |i, _| i != 2).is_none());
    }
}
