//! Distance-to-confidence policy.
//!
//! The linear saturating curve lives here alone so that the decision engine
//! never depends on its shape.

use crate::engine::MatchError;
use serde::{Deserialize, Serialize};

/// Maximum distance at which a candidate still counts as a match.
///
/// Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Tolerance(f32);

impl Tolerance {
    pub fn new(value: f32) -> Result<Self, MatchError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(MatchError::InvalidTolerance(value))
        }
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl TryFrom<f32> for Tolerance {
    type Error = MatchError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tolerance> for f32 {
    fn from(tolerance: Tolerance) -> Self {
        tolerance.0
    }
}

/// Confidence score in `[0, 100]` for a distance under the given tolerance.
///
/// `100 * (1 − distance / tolerance)`, clamped. A distance of 0 scores 100,
/// a distance equal to the tolerance scores 0, anything further stays at 0.
/// NaN and negative distances are rejected.
pub fn confidence(distance: f32, tolerance: f32) -> Result<f32, MatchError> {
    let tolerance = Tolerance::new(tolerance)?;
    if distance.is_nan() || distance < 0.0 {
        return Err(MatchError::InvalidDistance(distance));
    }
    Ok(score(distance, tolerance))
}

pub(crate) fn score(distance: f32, tolerance: Tolerance) -> f32 {
    (100.0 * (1.0 - distance / tolerance.get())).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_rejects_non_positive() {
        assert_eq!(Tolerance::new(0.0), Err(MatchError::InvalidTolerance(0.0)));
        assert_eq!(Tolerance::new(-0.5), Err(MatchError::InvalidTolerance(-0.5)));
        assert!(Tolerance::new(f32::NAN).is_err());
        assert!(Tolerance::new(f32::INFINITY).is_err());
        assert_eq!(Tolerance::new(0.5).unwrap().get(), 0.5);
    }

    #[test]
    fn test_confidence_at_zero_distance() {
        for t in [0.1, 0.4, 0.5, 0.6, 2.0] {
            assert_eq!(confidence(0.0, t).unwrap(), 100.0);
        }
    }

    #[test]
    fn test_confidence_at_tolerance() {
        for t in [0.1, 0.4, 0.5, 0.6, 2.0] {
            assert_eq!(confidence(t, t).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_confidence_midpoint() {
        let c = confidence(0.25, 0.5).unwrap();
        assert!((c - 50.0).abs() < 1e-4, "got {c}");
    }

    #[test]
    fn test_confidence_clamps_beyond_tolerance() {
        assert_eq!(confidence(0.9, 0.5).unwrap(), 0.0);
        assert_eq!(confidence(1e6, 0.5).unwrap(), 0.0);
    }

    #[test]
    fn test_confidence_rejects_nan_and_negative_distance() {
        assert!(matches!(
            confidence(f32::NAN, 0.5),
            Err(MatchError::InvalidDistance(d)) if d.is_nan()
        ));
        assert_eq!(confidence(-0.1, 0.5), Err(MatchError::InvalidDistance(-0.1)));
        assert_eq!(confidence(f32::INFINITY, 0.5).unwrap(), 0.0);
    }

    #[test]
    fn test_confidence_monotonic() {
        let mut prev = f32::INFINITY;
        for step in 0..200 {
            let d = step as f32 * 0.005;
            let c = confidence(d, 0.6).unwrap();
            assert!(c <= prev, "confidence rose at d={d}: {prev} -> {c}");
            assert!((0.0..=100.0).contains(&c));
            prev = c;
        }
    }

    #[test]
    fn test_confidence_invalid_tolerance() {
        assert_eq!(confidence(0.1, 0.0), Err(MatchError::InvalidTolerance(0.0)));
        assert_eq!(confidence(0.1, -1.0), Err(MatchError::InvalidTolerance(-1.0)));
    }
}
