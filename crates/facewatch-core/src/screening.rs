//! Caller-facing screening flow: encode → decide per face → audit.

use crate::audit::{AuditContext, AuditError, AuditRecord, AuditRecorder, AuditSink};
use crate::collaborators::{FaceEncoder, IdentityRepository};
use crate::engine::{MatchEngine, MatchError};
use crate::types::MatchDecision;
use chrono::Utc;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("encoder failure: {0}")]
    Encoder(#[source] BoxError),
    #[error("repository failure: {0}")]
    Repository(#[source] BoxError),
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Decision for one detected face, with the outcome of its audit write.
///
/// The two are independent: a failed audit write never invalidates the
/// decision.
#[derive(Debug)]
pub struct FaceScreening {
    pub decision: MatchDecision,
    pub audit: Result<AuditRecord, AuditError>,
}

#[derive(Debug)]
pub struct ScreeningReport {
    /// One entry per detected face, or a single `NoFaceDetected` entry.
    pub faces: Vec<FaceScreening>,
}

impl ScreeningReport {
    /// Highest-confidence matching face, if any face matched.
    pub fn best_match(&self) -> Option<&MatchDecision> {
        self.faces
            .iter()
            .map(|f| &f.decision)
            .filter(|d| d.is_match())
            .fold(None, |best: Option<&MatchDecision>, d| match best {
                Some(b) if b.confidence >= d.confidence => Some(b),
                _ => Some(d),
            })
    }

    pub fn audit_failures(&self) -> impl Iterator<Item = &AuditError> {
        self.faces.iter().filter_map(|f| f.audit.as_ref().err())
    }

    pub fn fully_audited(&self) -> bool {
        self.faces.iter().all(|f| f.audit.is_ok())
    }
}

/// Wires the encoder, repository and audit sink around the match engine.
pub struct Screener<E, R, S> {
    encoder: E,
    repository: R,
    recorder: AuditRecorder<S>,
    engine: MatchEngine,
}

impl<E, R, S> Screener<E, R, S>
where
    E: FaceEncoder,
    R: IdentityRepository,
    S: AuditSink,
{
    pub fn new(encoder: E, repository: R, sink: S, engine: MatchEngine) -> Self {
        Self {
            encoder,
            repository,
            recorder: AuditRecorder::new(sink),
            engine,
        }
    }

    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    /// Screen one submitted image.
    ///
    /// Encoder, repository and matching errors abort before anything is
    /// audited. Once every face has a decision, each one is recorded and
    /// its audit outcome reported alongside it.
    pub fn screen(
        &self,
        image: &[u8],
        context: &AuditContext,
    ) -> Result<ScreeningReport, ScreeningError> {
        let probes = self
            .encoder
            .encode(image)
            .map_err(|e| ScreeningError::Encoder(Box::new(e)))?;

        if probes.is_empty() {
            tracing::info!(image_ref = %context.image_ref, "no face detected");
            let decision = MatchDecision::no_face_detected(self.engine.tolerance(), Utc::now());
            let audit = self.recorder.record(&decision, context, None);
            return Ok(ScreeningReport {
                faces: vec![FaceScreening { decision, audit }],
            });
        }

        let candidates = self
            .repository
            .list_enrolled()
            .map_err(|e| ScreeningError::Repository(Box::new(e)))?;

        tracing::debug!(
            image_ref = %context.image_ref,
            faces = probes.len(),
            candidates = candidates.len(),
            "screening"
        );

        let decisions = probes
            .iter()
            .map(|probe| self.engine.decide(probe, &candidates, Utc::now()))
            .collect::<Result<Vec<_>, _>>()?;

        let faces = decisions
            .into_iter()
            .enumerate()
            .map(|(index, decision)| {
                tracing::info!(
                    image_ref = %context.image_ref,
                    face = index,
                    outcome = %decision.outcome,
                    identity = ?decision.identity_id,
                    confidence = ?decision.confidence,
                    "face screened"
                );
                let audit = self.recorder.record(&decision, context, Some(index));
                FaceScreening { decision, audit }
            })
            .collect();

        Ok(ScreeningReport { faces })
    }
}
