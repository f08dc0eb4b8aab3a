use std::collections::HashSet;
use std::hash::Hash;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::entity::FeatureId;
use crate::scale::{ColumnScale, ColumnValueScale, FeatureScale, ScaleError};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SampleError {
    #[error("Insufficient unique features remaining: requested {requested}, available {available}")]
    InsufficientFeatures { requested: usize, available: usize },
    #[error(transparent)]
    Scale(#[from] ScaleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Redraws inside one chosen group before the draw is given up.
    pub max_feature_retries: usize,
    /// Consecutive draws without a selection before sampling stops.
    pub max_empty_draws: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            max_feature_retries: 64,
            max_empty_draws: 10_000,
        }
    }
}

/// Area-weighted draws without replacement over a finalized [`ColumnScale`].
pub struct WeightedSampler<'a, K> {
    scale: &'a ColumnScale<K>,
    config: SamplerConfig,
    excluded: HashSet<FeatureId>,
    remaining: Vec<usize>,
}

impl<'a, K: Eq + Hash + Clone> WeightedSampler<'a, K> {
    pub fn new(scale: &'a ColumnScale<K>, config: SamplerConfig) -> Result<Self, SampleError> {
        if !scale.is_finalized() {
            return Err(ScaleError::NotFinalized.into());
        }
        let remaining = scale.groups().map(|(_, group)| group.len()).collect();
        Ok(WeightedSampler {
            scale,
            config,
            excluded: HashSet::new(),
            remaining,
        })
    }

    pub fn excluded(&self) -> &HashSet<FeatureId> {
        &self.excluded
    }

    /// Draws `n` distinct feature ids, returned in draw order.
    pub fn sample<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> Result<Vec<FeatureId>, SampleError> {
        let available = self.scale.feature_count().saturating_sub(self.excluded.len());
        if n > available {
            return Err(SampleError::InsufficientFeatures { requested: n, available });
        }

        let mut selected = Vec::with_capacity(n);
        let mut empty_draws = 0;
        while selected.len() < n {
            match self.draw(rng) {
                Some(feature_id) => {
                    selected.push(feature_id);
                    empty_draws = 0;
                }
                None => {
                    empty_draws += 1;
                    if empty_draws > self.config.max_empty_draws {
                        warn!(selected = selected.len(), requested = n, "giving up after repeated empty draws");
                        return Err(SampleError::InsufficientFeatures {
                            requested: n,
                            available: selected.len(),
                        });
                    }
                }
            }
        }
        Ok(selected)
    }

    /// One group draw followed by bounded feature draws inside that group.
    fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<FeatureId> {
        let group_draw: f64 = rng.gen();
        let scale = self.scale;
        let remaining = &self.remaining;
        let (group_index, group) = scale.find_group(group_draw, |index, _| remaining[index] > 0)?;

        let feature = self.draw_feature(group, rng)?;
        let feature_id = feature.feature_id;
        debug!(group_draw = group_draw, group_index = group_index, feature_id = feature_id, "weighted draw");

        self.excluded.insert(feature_id);
        self.remaining[group_index] -= 1;
        Some(feature_id)
    }

    fn draw_feature<R: Rng + ?Sized>(&self, group: &'a ColumnValueScale, rng: &mut R) -> Option<&'a FeatureScale> {
        let excluded = &self.excluded;
        for _ in 0..self.config.max_feature_retries {
            let feature_draw: f64 = rng.gen();
            if let Some(feature) = group.find_feature(feature_draw, |f| !excluded.contains(&f.feature_id)) {
                return Some(feature);
            }
        }
        None
    }
}

/// Draws `n` distinct sequential positions out of `[0, count)`.
pub fn sample_uniform<R: Rng + ?Sized>(count: usize, n: usize, rng: &mut R) -> Result<Vec<usize>, SampleError> {
    if n > count {
        return Err(SampleError::InsufficientFeatures { requested: n, available: count });
    }
    let mut positions: Vec<usize> = (0..count).collect();
    let mut selected = Vec::with_capacity(n);
    for _ in 0..n {
        let index = rng.gen_range(0..positions.len());
        selected.push(positions.remove(index));
    }
    Ok(selected)
}
