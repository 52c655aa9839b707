//! facewatch-core — Face matching and audit engine.
//!
//! Compares a probe feature vector against enrolled reference vectors by
//! Euclidean distance, scores the result, applies a tolerance gate and
//! records every decision in an append-only audit trail.

pub mod audit;
pub mod collaborators;
pub mod engine;
pub mod metric;
pub mod scoring;
pub mod screening;
pub mod types;

pub use audit::{AuditContext, AuditError, AuditRecord, AuditRecorder, AuditSink};
pub use collaborators::{FaceEncoder, IdentityRepository};
pub use engine::{decide, MatchEngine, MatchError};
pub use metric::distance;
pub use scoring::{confidence, Tolerance};
pub use screening::{FaceScreening, ScreeningError, ScreeningReport, Screener};
pub use types::{
    Candidate, FeatureVector, IdentityId, MatchDecision, MatchOutcome, VectorError,
};

/// Default match tolerance (Euclidean distance).
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Default feature-vector length.
pub const DEFAULT_DIMENSION: usize = 128;
