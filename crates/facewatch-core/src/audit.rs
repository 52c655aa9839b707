//! Append-only audit trail of match decisions.

use crate::types::{IdentityId, MatchDecision, MatchOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit write failed for record {record_id}: {source}")]
    WriteFailed {
        record_id: Uuid,
        #[source]
        source: BoxError,
    },
}

/// Request metadata attached to every audit record of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditContext {
    /// Caller-supplied reference to the submitted image (file name, upload key, ...).
    pub image_ref: String,
    /// Hex SHA-256 of the submitted bytes, when available.
    pub image_digest: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl AuditContext {
    pub fn new(image_ref: impl Into<String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            image_ref: image_ref.into(),
            image_digest: None,
            submitted_at,
        }
    }

    /// Context for a submission received now, fingerprinted by its bytes.
    pub fn for_image(image_ref: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            image_ref: image_ref.into(),
            image_digest: Some(format!("{:x}", Sha256::digest(bytes))),
            submitted_at: Utc::now(),
        }
    }
}

/// Immutable trace of one decision for one detected face (or of the
/// absence of any face).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub image_ref: String,
    pub image_digest: Option<String>,
    /// Position of the face within the submission; `None` for `NoFaceDetected`.
    pub face_index: Option<usize>,
    pub outcome: MatchOutcome,
    /// Identity implicated by a `Match`.
    pub identity_id: Option<IdentityId>,
    pub distance: Option<f32>,
    pub confidence: Option<f32>,
    pub tolerance: f32,
    pub decided_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn from_decision(
        decision: &MatchDecision,
        context: &AuditContext,
        face_index: Option<usize>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_ref: context.image_ref.clone(),
            image_digest: context.image_digest.clone(),
            face_index,
            outcome: decision.outcome,
            identity_id: decision.identity_id,
            distance: decision.distance,
            confidence: decision.confidence,
            tolerance: decision.tolerance,
            decided_at: decision.decided_at,
            submitted_at: context.submitted_at,
            recorded_at: Utc::now(),
        }
    }

    /// Single-line JSON rendering, suitable for JSON-lines export.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Durable destination for audit records.
///
/// Append-only: there is intentionally no update or delete operation.
pub trait AuditSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn append(&self, record: &AuditRecord) -> Result<(), Self::Error>;
}

impl<T: AuditSink + ?Sized> AuditSink for &T {
    type Error = T::Error;

    fn append(&self, record: &AuditRecord) -> Result<(), Self::Error> {
        (**self).append(record)
    }
}

/// Turns decisions into audit records and persists each exactly once.
pub struct AuditRecorder<S> {
    sink: S,
}

impl<S: AuditSink> AuditRecorder<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Persist one decision. The decision itself is never altered; a failed
    /// write is returned to the caller as [`AuditError::WriteFailed`].
    pub fn record(
        &self,
        decision: &MatchDecision,
        context: &AuditContext,
        face_index: Option<usize>,
    ) -> Result<AuditRecord, AuditError> {
        let record = AuditRecord::from_decision(decision, context, face_index);

        match self.sink.append(&record) {
            Ok(()) => {
                tracing::debug!(
                    record_id = %record.id,
                    outcome = %record.outcome,
                    image_ref = %record.image_ref,
                    "audit record written"
                );
                Ok(record)
            }
            Err(err) => {
                tracing::warn!(
                    record_id = %record.id,
                    outcome = %record.outcome,
                    error = %err,
                    "audit write failed"
                );
                Err(AuditError::WriteFailed {
                    record_id: record.id,
                    source: Box::new(err),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Debug, Error)]
    #[error("disk full")]
    pub(crate) struct DiskFull;

    /// In-memory sink that can be switched into a failing state.
    #[derive(Default)]
    pub(crate) struct MemorySink {
        pub records: RefCell<Vec<AuditRecord>>,
        pub fail: Cell<bool>,
    }

    impl AuditSink for MemorySink {
        type Error = DiskFull;

        fn append(&self, record: &AuditRecord) -> Result<(), DiskFull> {
            if self.fail.get() {
                return Err(DiskFull);
            }
            self.records.borrow_mut().push(record.clone());
            Ok(())
        }
    }

    fn matched_decision() -> MatchDecision {
        MatchDecision {
            outcome: MatchOutcome::Match,
            identity_id: Some(IdentityId(42)),
            nearest_id: Some(IdentityId(42)),
            distance: Some(0.1),
            confidence: Some(80.0),
            tolerance: 0.5,
            decided_at: Utc::now(),
        }
    }

    #[test]
    fn test_for_image_digest() {
        let ctx = AuditContext::for_image("probe.jpg", b"abc");
        assert_eq!(
            ctx.image_digest.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(ctx.image_ref, "probe.jpg");
    }

    #[test]
    fn test_record_copies_decision_and_context() {
        let sink = MemorySink::default();
        let recorder = AuditRecorder::new(&sink);
        let decision = matched_decision();
        let ctx = AuditContext::new("upload-7", Utc::now());

        let record = recorder.record(&decision, &ctx, Some(0)).unwrap();
        assert_eq!(record.outcome, MatchOutcome::Match);
        assert_eq!(record.identity_id, Some(IdentityId(42)));
        assert_eq!(record.confidence, Some(80.0));
        assert_eq!(record.decided_at, decision.decided_at);
        assert_eq!(record.submitted_at, ctx.submitted_at);
        assert_eq!(record.face_index, Some(0));

        let stored = sink.records.borrow();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], record);
    }

    #[test]
    fn test_no_face_record_has_no_candidate() {
        let sink = MemorySink::default();
        let recorder = AuditRecorder::new(&sink);
        let decision = MatchDecision::no_face_detected(0.6, Utc::now());
        let ctx = AuditContext::new("empty.png", Utc::now());

        let record = recorder.record(&decision, &ctx, None).unwrap();
        assert_eq!(record.outcome, MatchOutcome::NoFaceDetected);
        assert!(record.identity_id.is_none());
        assert!(record.distance.is_none());
        assert!(record.face_index.is_none());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let sink = MemorySink::default();
        sink.fail.set(true);
        let recorder = AuditRecorder::new(&sink);
        let decision = matched_decision();
        let before = decision.clone();

        let err = recorder
            .record(&decision, &AuditContext::new("x", Utc::now()), Some(0))
            .unwrap_err();
        assert!(matches!(err, AuditError::WriteFailed { .. }));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(decision, before);
        assert!(sink.records.borrow().is_empty());
    }

    #[test]
    fn test_json_line_uses_wire_outcome() {
        let record = AuditRecord::from_decision(
            &matched_decision(),
            &AuditContext::new("a.jpg", Utc::now()),
            Some(0),
        );
        let line = record.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"outcome\":\"MATCH\""));
        assert!(line.contains("\"identity_id\":42"));
        let parsed: AuditRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }
}
