use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorError {
    #[error("feature vector is empty")]
    Empty,
    #[error("feature vector component {index} is not finite")]
    NonFinite { index: usize },
    #[error("packed vector length {0} is not a multiple of 4 bytes")]
    Misaligned(usize),
}

/// Face feature vector produced by an external encoder.
///
/// Every component is finite, so distances computed from it are never NaN.
/// The length `L` is not fixed by the type; it is checked against the
/// configured dimension by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Result<Self, VectorError> {
        if values.is_empty() {
            return Err(VectorError::Empty);
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(VectorError::NonFinite { index });
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Never true for a constructed vector.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Pack as little-endian f32 bytes (4 bytes per component).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Inverse of [`to_le_bytes`](Self::to_le_bytes).
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, VectorError> {
        if bytes.len() % 4 != 0 {
            return Err(VectorError::Misaligned(bytes.len()));
        }
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::new(values)
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = VectorError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(vector: FeatureVector) -> Self {
        vector.values
    }
}

/// Identifier of an enrolled identity, assigned by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub i64);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One reference vector of one enrolled identity.
///
/// An identity enrolled with several vectors contributes several candidates;
/// each is compared independently and the best overall wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub identity_id: IdentityId,
    pub vector: FeatureVector,
}

impl Candidate {
    pub fn new(identity_id: IdentityId, vector: FeatureVector) -> Self {
        Self { identity_id, vector }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchOutcome {
    Match,
    NoMatch,
    NoFaceDetected,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Match => "MATCH",
            MatchOutcome::NoMatch => "NO_MATCH",
            MatchOutcome::NoFaceDetected => "NO_FACE_DETECTED",
        }
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for MatchOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MATCH" => Ok(MatchOutcome::Match),
            "NO_MATCH" => Ok(MatchOutcome::NoMatch),
            "NO_FACE_DETECTED" => Ok(MatchOutcome::NoFaceDetected),
            other => Err(format!("unknown match outcome: {other}")),
        }
    }
}

/// Result of matching one probe vector against the enrolled candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub outcome: MatchOutcome,
    /// Matched identity. Present iff `outcome` is `Match`.
    pub identity_id: Option<IdentityId>,
    /// Nearest candidate, reported for diagnostics even on `NoMatch`.
    pub nearest_id: Option<IdentityId>,
    /// Distance to the nearest candidate. Absent when nothing was compared.
    pub distance: Option<f32>,
    /// Confidence in [0, 100]. Absent when nothing was compared.
    pub confidence: Option<f32>,
    pub tolerance: f32,
    pub decided_at: DateTime<Utc>,
}

impl MatchDecision {
    /// Decision for an image in which the encoder found no face.
    pub fn no_face_detected(tolerance: f32, decided_at: DateTime<Utc>) -> Self {
        Self {
            outcome: MatchOutcome::NoFaceDetected,
            identity_id: None,
            nearest_id: None,
            distance: None,
            confidence: None,
            tolerance,
            decided_at,
        }
    }

    pub fn is_match(&self) -> bool {
        self.outcome == MatchOutcome::Match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_rejects_empty() {
        assert_eq!(FeatureVector::new(vec![]), Err(VectorError::Empty));
    }

    #[test]
    fn test_vector_rejects_nan_and_infinity() {
        assert_eq!(
            FeatureVector::new(vec![0.1, f32::NAN, 0.3]),
            Err(VectorError::NonFinite { index: 1 })
        );
        assert_eq!(
            FeatureVector::new(vec![f32::INFINITY]),
            Err(VectorError::NonFinite { index: 0 })
        );
    }

    #[test]
    fn test_le_bytes_roundtrip() {
        let v = FeatureVector::new(vec![0.25, -1.5, 3.0]).unwrap();
        let bytes = v.to_le_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(FeatureVector::from_le_bytes(&bytes).unwrap(), v);
    }

    #[test]
    fn test_le_bytes_misaligned() {
        assert_eq!(
            FeatureVector::from_le_bytes(&[0, 0, 0]),
            Err(VectorError::Misaligned(3))
        );
    }

    #[test]
    fn test_vector_deserialize_validates() {
        let ok: FeatureVector = serde_json::from_str("[0.5, 0.25]").unwrap();
        assert_eq!(ok.as_slice(), &[0.5, 0.25]);
        assert!(serde_json::from_str::<FeatureVector>("[]").is_err());
    }

    #[test]
    fn test_outcome_wire_names() {
        let json = serde_json::to_string(&MatchOutcome::NoFaceDetected).unwrap();
        assert_eq!(json, "\"NO_FACE_DETECTED\"");
        assert_eq!("NO_MATCH".parse::<MatchOutcome>(), Ok(MatchOutcome::NoMatch));
        assert!("maybe".parse::<MatchOutcome>().is_err());
    }

    #[test]
    fn test_no_face_decision_has_no_candidate() {
        let d = MatchDecision::no_face_detected(0.6, Utc::now());
        assert_eq!(d.outcome, MatchOutcome::NoFaceDetected);
        assert!(d.identity_id.is_none());
        assert!(d.nearest_id.is_none());
        assert!(d.distance.is_none());
        assert!(d.confidence.is_none());
        assert!(!d.is_match());
    }
}
