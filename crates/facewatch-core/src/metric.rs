//! Euclidean distance between feature vectors.

use crate::engine::MatchError;
use crate::types::FeatureVector;

/// Euclidean distance `sqrt(Σ (a_i − b_i)²)`, in `[0, ∞)`.
///
/// Vectors of different length are rejected rather than truncated.
pub fn distance(a: &FeatureVector, b: &FeatureVector) -> Result<f32, MatchError> {
    if a.len() != b.len() {
        return Err(MatchError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt())
}
