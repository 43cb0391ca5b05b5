//! Embedding matching
//!
//! Bounds features before inference and scores a fresh embedding against the
//! enrolled one. The score is a plain Euclidean distance; turning it into an
//! accept/reject decision requires a caller-supplied threshold.

use crate::error::AuthError;
use crate::types::{Embedding, FeatureVector};
use serde::Serialize;

/// Element-wise clamp of a feature vector into `[lo, hi]`
pub fn clamp(vector: &FeatureVector, lo: f32, hi: f32) -> FeatureVector {
    let mut clamped = vector.clone();
    for value in clamped.as_mut_slice() {
        *value = clamp_value(*value, lo, hi);
    }
    clamped
}

/// Element-wise clamp of an arbitrary slice into `[lo, hi]`
pub fn clamp_values(values: &[f32], lo: f32, hi: f32) -> Vec<f32> {
    values.iter().map(|v| clamp_value(*v, lo, hi)).collect()
}

fn clamp_value(value: f32, lo: f32, hi: f32) -> f32 {
    value.min(hi).max(lo)
}

/// Euclidean distance between two equal-length vectors
pub fn distance(a: &[f32], b: &[f32]) -> Result<f32, AuthError> {
    if a.len() != b.len() {
        return Err(AuthError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let sum: f32 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum();
    Ok(sum.sqrt())
}

/// Outcome of applying a threshold to a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDecision {
    Genuine,
    Impostor,
}

/// Distance between a fresh embedding and the enrolled one
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchScore {
    pub distance: f32,
}

impl MatchScore {
    pub fn between(enrolled: &Embedding, fresh: &Embedding) -> Result<Self, AuthError> {
        Ok(Self {
            distance: distance(enrolled.as_slice(), fresh.as_slice())?,
        })
    }

    /// Genuine when the distance is strictly below `threshold`
    pub fn decide(&self, threshold: f32) -> MatchDecision {
        if self.distance < threshold {
            MatchDecision::Genuine
        } else {
            MatchDecision::Impostor
        }
    }
}
