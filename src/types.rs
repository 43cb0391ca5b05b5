//! Core data types
//!
//! This module defines the values that flow through the authentication
//! pipeline: sensor readings, derived samples, feature vectors and embeddings.

use crate::error::AuthError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Components per sample: X, Y, Z and the derived magnitude
pub const SAMPLE_COMPONENTS: usize = 4;

/// Feature values contributed by one sensor stream (3 phases × 4 stats × 4 components)
pub const FEATURES_PER_STREAM: usize = 48;

/// Length of every feature vector handed to the embedding model
pub const FEATURE_VECTOR_LEN: usize = FEATURES_PER_STREAM * SensorStreamId::ALL.len();

/// Motion sensor streams, in feature-vector serialization order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStreamId {
    Accelerometer,
    Gyroscope,
    Magnetometer,
}

impl SensorStreamId {
    /// All streams in the order they are serialized into a feature vector
    pub const ALL: [SensorStreamId; 3] = [
        SensorStreamId::Accelerometer,
        SensorStreamId::Gyroscope,
        SensorStreamId::Magnetometer,
    ];

    /// Position of this stream in [`SensorStreamId::ALL`]
    pub fn index(self) -> usize {
        match self {
            SensorStreamId::Accelerometer => 0,
            SensorStreamId::Gyroscope => 1,
            SensorStreamId::Magnetometer => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorStreamId::Accelerometer => "accelerometer",
            SensorStreamId::Gyroscope => "gyroscope",
            SensorStreamId::Magnetometer => "magnetometer",
        }
    }
}

/// A raw 3-axis reading as delivered by the host sensor subsystem.
///
/// The timestamp is provenance only; buffers are ordered by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub stream: SensorStreamId,
    pub values: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SensorReading {
    pub fn new(stream: SensorStreamId, values: [f32; 3]) -> Self {
        Self {
            stream,
            values,
            timestamp: None,
        }
    }

    pub fn at(stream: SensorStreamId, values: [f32; 3], timestamp: DateTime<Utc>) -> Self {
        Self {
            stream,
            values,
            timestamp: Some(timestamp),
        }
    }
}

/// One buffered sample: X, Y, Z and the Euclidean norm of the three axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample([f32; SAMPLE_COMPONENTS]);

impl Sample {
    /// Build a sample from raw axis values, deriving the magnitude.
    ///
    /// Rejects non-finite axes and axes large enough to overflow the magnitude,
    /// which keeps every downstream statistic finite.
    pub fn from_axes(values: [f32; 3]) -> Result<Self, AuthError> {
        let [x, y, z] = values;
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(AuthError::InvalidSample(format!(
                "non-finite axis value in {values:?}"
            )));
        }
        let magnitude = (x * x + y * y + z * z).sqrt();
        if !magnitude.is_finite() {
            return Err(AuthError::InvalidSample(format!(
                "magnitude of {values:?} overflows"
            )));
        }
        Ok(Self([x, y, z, magnitude]))
    }

    pub fn components(&self) -> &[f32; SAMPLE_COMPONENTS] {
        &self.0
    }

    pub fn magnitude(&self) -> f32 {
        self.0[3]
    }
}

/// Fixed-length (144) feature vector consumed positionally by the embedding model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn zeros() -> Self {
        Self(vec![0.0; FEATURE_VECTOR_LEN])
    }

    /// Fill every slot with `value` (handy for tests and stubs)
    pub fn splat(value: f32) -> Self {
        Self(vec![value; FEATURE_VECTOR_LEN])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = AuthError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        if values.len() != FEATURE_VECTOR_LEN {
            return Err(AuthError::DimensionMismatch {
                expected: FEATURE_VECTOR_LEN,
                actual: values.len(),
            });
        }
        Ok(Self(values))
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(vector: FeatureVector) -> Self {
        vector.0
    }
}

/// Model output: a point in the learned behavioral space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_magnitude() {
        let sample = Sample::from_axes([3.0, 4.0, 0.0]).unwrap();
        assert_eq!(sample.components(), &[3.0, 4.0, 0.0, 5.0]);
        assert_eq!(sample.magnitude(), 5.0);
    }

    #[test]
    fn test_sample_rejects_non_finite() {
        assert!(Sample::from_axes([f32::NAN, 0.0, 0.0]).is_err());
        assert!(Sample::from_axes([0.0, f32::INFINITY, 0.0]).is_err());
        assert!(Sample::from_axes([f32::MAX, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_feature_vector_length_enforced() {
        assert_eq!(FEATURE_VECTOR_LEN, 144);
        let err = FeatureVector::try_from(vec![0.0; 143]).unwrap_err();
        assert!(matches!(
            err,
            AuthError::DimensionMismatch {
                expected: 144,
                actual: 143
            }
        ));
        assert!(FeatureVector::try_from(vec![1.0; 144]).is_ok());
    }

    #[test]
    fn test_feature_vector_json_is_flat_array() {
        let vector = FeatureVector::splat(0.5);
        let json = serde_json::to_string(&vector).unwrap();
        assert!(json.starts_with("[0.5,"));

        let parsed: FeatureVector = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vector);

        assert!(serde_json::from_str::<FeatureVector>("[1.0, 2.0]").is_err());
    }

    #[test]
    fn test_stream_order() {
        for (i, stream) in SensorStreamId::ALL.iter().enumerate() {
            assert_eq!(stream.index(), i);
        }
        let json = serde_json::to_string(&SensorStreamId::Magnetometer).unwrap();
        assert_eq!(json, "\"magnetometer\"");
    }
}
