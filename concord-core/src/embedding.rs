//! Embedding vectors produced by a backend or the local fallback.

use crate::{ConcordError, ConcordResult, VectorError};
use serde::{Deserialize, Serialize};

/// A fixed-length embedding. The dimension is the length of `data`; there is
/// no separate count that could disagree with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EmbeddingVector {
    pub data: Vec<f32>,
    /// Model that produced the vector, or the fallback marker.
    pub model_id: String,
}

impl EmbeddingVector {
    pub fn new(data: Vec<f32>, model_id: String) -> Self {
        Self { data, model_id }
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Whether the index can use this vector: non-empty, every component
    /// finite, and not the zero vector (which has no direction to compare).
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.data.iter().all(|x| x.is_finite()) && self.norm() > 0.0
    }

    /// Cosine similarity in [-1, 1]. A zero vector on either side scores 0.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> ConcordResult<f32> {
        if self.len() != other.len() {
            return Err(ConcordError::Vector(VectorError::DimensionMismatch {
                expected: self.len(),
                got: other.len(),
            }));
        }

        let (norm_a, norm_b) = (self.norm(), other.norm());
        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }
        let dot: f32 = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum();
        Ok(dot / (norm_a * norm_b))
    }
}
