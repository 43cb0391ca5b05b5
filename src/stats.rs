//! Window statistics
//!
//! Per-component mean, population standard deviation, minimum and maximum over
//! a window snapshot. Components (X, Y, Z, magnitude) never interact.
//!
//! Sums are accumulated in `f64` and rounded once to `f32`, so results are
//! reproducible bit-for-bit for a given window.
//!
//! Empty windows are not an error. They produce zeros for mean, standard
//! deviation and maximum, and [`EMPTY_MIN_SENTINEL`] for the minimum.

use crate::types::{Sample, SAMPLE_COMPONENTS};

/// Per-component values for one statistic
pub type Components = [f32; SAMPLE_COMPONENTS];

/// Minimum reported for an empty window
pub const EMPTY_MIN_SENTINEL: f32 = f32::MAX;

/// Maximum reported for an empty window
pub const EMPTY_MAX_SENTINEL: f32 = 0.0;

/// The four statistics of one window, or the difference of two such sets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatSet {
    pub mean: Components,
    pub std_dev: Components,
    pub min: Components,
    pub max: Components,
}

impl StatSet {
    /// Element-wise `self - earlier` for every statistic
    pub fn diff_from(&self, earlier: &StatSet) -> StatSet {
        StatSet {
            mean: sub(&self.mean, &earlier.mean),
            std_dev: sub(&self.std_dev, &earlier.std_dev),
            min: sub(&self.min, &earlier.min),
            max: sub(&self.max, &earlier.max),
        }
    }

    /// Values for one component, in serialization order: mean, std, min, max
    pub(crate) fn component(&self, index: usize) -> [f32; 4] {
        [
            self.mean[index],
            self.std_dev[index],
            self.min[index],
            self.max[index],
        ]
    }
}

fn sub(a: &Components, b: &Components) -> Components {
    std::array::from_fn(|i| a[i] - b[i])
}

/// Stateless statistics over window snapshots
pub struct StatisticsExtractor;

impl StatisticsExtractor {
    /// Compute all four statistics for a snapshot
    pub fn stat_set(samples: &[Sample]) -> StatSet {
        let mean = Self::mean(samples);
        StatSet {
            mean,
            std_dev: Self::std_dev(samples, &mean),
            min: Self::min(samples),
            max: Self::max(samples),
        }
    }

    /// Arithmetic mean per component
    pub fn mean(samples: &[Sample]) -> Components {
        if samples.is_empty() {
            return [0.0; SAMPLE_COMPONENTS];
        }
        // f64 accumulation keeps a window of identical samples exact
        let mut sum = [0.0f64; SAMPLE_COMPONENTS];
        for sample in samples {
            for (acc, value) in sum.iter_mut().zip(sample.components()) {
                *acc += f64::from(*value);
            }
        }
        let n = samples.len() as f64;
        sum.map(|acc| (acc / n) as f32)
    }

    /// Population standard deviation (divides by N) around the supplied mean
    pub fn std_dev(samples: &[Sample], mean: &Components) -> Components {
        if samples.is_empty() {
            return [0.0; SAMPLE_COMPONENTS];
        }
        let mut squares = [0.0f64; SAMPLE_COMPONENTS];
        for sample in samples {
            for ((acc, value), m) in squares.iter_mut().zip(sample.components()).zip(mean) {
                let delta = f64::from(*value) - f64::from(*m);
                *acc += delta * delta;
            }
        }
        let n = samples.len() as f64;
        squares.map(|acc| (acc / n).sqrt() as f32)
    }

    /// Per-component minimum
    pub fn min(samples: &[Sample]) -> Components {
        let mut min = [EMPTY_MIN_SENTINEL; SAMPLE_COMPONENTS];
        for sample in samples {
            for (acc, value) in min.iter_mut().zip(sample.components()) {
                *acc = acc.min(*value);
            }
        }
        min
    }

    /// Per-component maximum
    pub fn max(samples: &[Sample]) -> Components {
        if samples.is_empty() {
            return [EMPTY_MAX_SENTINEL; SAMPLE_COMPONENTS];
        }
        let mut max = [f32::NEG_INFINITY; SAMPLE_COMPONENTS];
        for sample in samples {
            for (acc, value) in max.iter_mut().zip(sample.components()) {
                *acc = acc.max(*value);
            }
        }
        max
    }
}
