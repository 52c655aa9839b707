//! Match decision engine.
//!
//! Compares one probe vector against an ordered sequence of candidates and
//! produces a [`MatchDecision`]. The computation is pure: no I/O, no shared
//! state, and the decision timestamp is supplied by the caller, so identical
//! inputs always yield identical decisions.

use crate::metric::distance;
use crate::scoring::{self, Tolerance};
use crate::types::{Candidate, FeatureVector, IdentityId, MatchDecision, MatchOutcome};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid tolerance {0}: must be finite and greater than zero")]
    InvalidTolerance(f32),
    #[error("invalid distance {0}: must be a non-negative number")]
    InvalidDistance(f32),
    #[error("invalid vector dimension: must be greater than zero")]
    InvalidDimension,
}

/// Decide whether `probe` matches any of `candidates`.
///
/// The nearest candidate wins; on an exact distance tie the one supplied
/// first wins, so callers must pass candidates in a stable order.
/// `Match` iff the nearest distance is `<= tolerance`. An empty candidate
/// set is always `NoMatch` with no distance or confidence attached.
pub fn decide(
    probe: &FeatureVector,
    candidates: &[Candidate],
    tolerance: f32,
    decided_at: DateTime<Utc>,
) -> Result<MatchDecision, MatchError> {
    let tolerance = Tolerance::new(tolerance)?;

    let mut best: Option<(IdentityId, f32)> = None;

    // Every candidate is compared, no early exit. Strict `<` keeps the
    // first of several equal distances.
    for candidate in candidates {
        let d = distance(probe, &candidate.vector)?;
        let closer = match best {
            None => true,
            Some((_, best_d)) => d < best_d,
        };
        if closer {
            best = Some((candidate.identity_id, d));
        }
    }

    let Some((nearest_id, best_distance)) = best else {
        return Ok(MatchDecision {
            outcome: MatchOutcome::NoMatch,
            identity_id: None,
            nearest_id: None,
            distance: None,
            confidence: None,
            tolerance: tolerance.get(),
            decided_at,
        });
    };

    let matched = best_distance <= tolerance.get();
    tracing::trace!(
        candidates = candidates.len(),
        nearest = %nearest_id,
        distance = best_distance,
        matched,
        "match decided"
    );

    Ok(MatchDecision {
        outcome: if matched {
            MatchOutcome::Match
        } else {
            MatchOutcome::NoMatch
        },
        identity_id: matched.then_some(nearest_id),
        nearest_id: Some(nearest_id),
        distance: Some(best_distance),
        confidence: Some(scoring::score(best_distance, tolerance)),
        tolerance: tolerance.get(),
        decided_at,
    })
}

/// Decision engine bound to the configured vector length and tolerance.
#[derive(Debug, Clone, Copy)]
pub struct MatchEngine {
    dimension: usize,
    tolerance: Tolerance,
}

impl MatchEngine {
    pub fn new(dimension: usize, tolerance: f32) -> Result<Self, MatchError> {
        if dimension == 0 {
            return Err(MatchError::InvalidDimension);
        }
        Ok(Self {
            dimension,
            tolerance: Tolerance::new(tolerance)?,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance.get()
    }

    /// Check that a vector has the configured length.
    pub fn check_dimension(&self, vector: &FeatureVector) -> Result<(), MatchError> {
        if vector.len() != self.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// [`decide`] with the probe length checked against the configured dimension.
    pub fn decide(
        &self,
        probe: &FeatureVector,
        candidates: &[Candidate],
        decided_at: DateTime<Utc>,
    ) -> Result<MatchDecision, MatchError> {
        self.check_dimension(probe)?;
        decide(probe, candidates, self.tolerance.get(), decided_at)
    }
}
