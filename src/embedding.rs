//! Embedding model boundary
//!
//! The behavioral model is an external collaborator: anything that maps a
//! 144-value feature vector to a fixed-length embedding can sit behind
//! [`EmbeddingClient`]. Enrollment and verification call it identically.

use crate::error::InferenceError;
use crate::types::{Embedding, FeatureVector, FEATURE_VECTOR_LEN};
use serde::{Deserialize, Serialize};

/// Capability to embed a feature vector
pub trait EmbeddingClient {
    fn infer(&self, features: &FeatureVector) -> Result<Embedding, InferenceError>;
}

impl<T: EmbeddingClient + ?Sized> EmbeddingClient for Box<T> {
    fn infer(&self, features: &FeatureVector) -> Result<Embedding, InferenceError> {
        (**self).infer(features)
    }
}

impl<T: EmbeddingClient + ?Sized> EmbeddingClient for &T {
    fn infer(&self, features: &FeatureVector) -> Result<Embedding, InferenceError> {
        (**self).infer(features)
    }
}

/// Affine projection `W · x + b` loaded from JSON.
///
/// ```json
/// { "weights": [[w_0_0, ..., w_0_143], ...], "bias": [b_0, ...] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearEmbedding {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl LinearEmbedding {
    /// Build a projection, checking every row spans the full feature vector
    pub fn new(weights: Vec<Vec<f32>>, bias: Vec<f32>) -> Result<Self, InferenceError> {
        if weights.is_empty() {
            return Err(InferenceError::ModelUnavailable(
                "projection has no output rows".to_string(),
            ));
        }
        if bias.len() != weights.len() {
            return Err(InferenceError::ModelUnavailable(format!(
                "bias has {} entries for {} output rows",
                bias.len(),
                weights.len()
            )));
        }
        if let Some(row) = weights.iter().find(|row| row.len() != FEATURE_VECTOR_LEN) {
            return Err(InferenceError::InputShape {
                expected: FEATURE_VECTOR_LEN,
                actual: row.len(),
            });
        }
        Ok(Self { weights, bias })
    }

    pub fn from_json(json: &str) -> Result<Self, InferenceError> {
        let raw: LinearEmbedding = serde_json::from_str(json)
            .map_err(|e| InferenceError::ModelUnavailable(format!("invalid model JSON: {e}")))?;
        Self::new(raw.weights, raw.bias)
    }

    /// Output dimensionality
    pub fn dimension(&self) -> usize {
        self.weights.len()
    }
}

impl EmbeddingClient for LinearEmbedding {
    fn infer(&self, features: &FeatureVector) -> Result<Embedding, InferenceError> {
        let input = features.as_slice();
        if input.len() != FEATURE_VECTOR_LEN {
            return Err(InferenceError::InputShape {
                expected: FEATURE_VECTOR_LEN,
                actual: input.len(),
            });
        }
        let output = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect();
        Ok(Embedding::new(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(dimension: usize) -> LinearEmbedding {
        // Row i picks feature i
        let weights = (0..dimension)
            .map(|i| {
                let mut row = vec![0.0; FEATURE_VECTOR_LEN];
                row[i] = 1.0;
                row
            })
            .collect();
        LinearEmbedding::new(weights, vec![0.5; dimension]).unwrap()
    }

    #[test]
    fn test_projection() {
        let model = selector(4);
        let mut values = vec![0.0; FEATURE_VECTOR_LEN];
        values[..4].copy_from_slice(&[1.0, -2.0, 3.0, 4.0]);
        let features = FeatureVector::try_from(values).unwrap();

        let embedding = model.infer(&features).unwrap();
        assert_eq!(embedding.as_slice(), &[1.5, -1.5, 3.5, 4.5]);
        assert_eq!(model.dimension(), 4);
    }

    #[test]
    fn test_shape_validation() {
        assert!(matches!(
            LinearEmbedding::new(vec![vec![0.0; 10]], vec![0.0]),
            Err(InferenceError::InputShape {
                expected: 144,
                actual: 10
            })
        ));
        assert!(matches!(
            LinearEmbedding::new(vec![vec![0.0; 144]], vec![]),
            Err(InferenceError::ModelUnavailable(_))
        ));
        assert!(LinearEmbedding::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_from_json() {
        let model = selector(2);
        let json = serde_json::to_string(&model).unwrap();
        let loaded = LinearEmbedding::from_json(&json).unwrap();
        assert_eq!(loaded.dimension(), 2);

        assert!(matches!(
            LinearEmbedding::from_json("{}"),
            Err(InferenceError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_boxed_client() {
        let client: Box<dyn EmbeddingClient> = Box::new(selector(1));
        let embedding = client.infer(&FeatureVector::splat(2.0)).unwrap();
        assert_eq!(embedding.as_slice(), &[2.5]);
    }
}
