use crate::store::{parse_timestamp, SqliteStore};
use crate::{Result, StoreError};
use facewatch_core::{AuditRecord, AuditSink, IdentityId, MatchOutcome};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

const AUDIT_SELECT: &str = "SELECT id, image_ref, image_digest, face_index, outcome, identity_id,
        distance, confidence, tolerance, decided_at, submitted_at, recorded_at
     FROM audit_records";

/// Aggregate screening figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub active_identities: u64,
    /// Distinct submissions, keyed by image reference and submission time.
    pub total_submissions: u64,
    /// Audit records, one per decided face (or per faceless submission).
    pub total_decisions: u64,
    pub matches_found: u64,
    /// Percentage of decisions that matched, one decimal place.
    pub match_rate: f64,
}

impl SqliteStore {
    /// Append one audit record. Records can never be updated or deleted.
    pub fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO audit_records (
                id, image_ref, image_digest, face_index, outcome, identity_id,
                distance, confidence, tolerance, decided_at, submitted_at, recorded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id.to_string(),
                record.image_ref,
                record.image_digest,
                record.face_index.map(|i| i as i64),
                record.outcome.as_str(),
                record.identity_id.map(|id| id.0),
                record.distance.map(f64::from),
                record.confidence.map(f64::from),
                f64::from(record.tolerance),
                record.decided_at.to_rfc3339(),
                record.submitted_at.to_rfc3339(),
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent audit records first.
    pub fn recent_audits(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{AUDIT_SELECT} ORDER BY seq DESC LIMIT ?1"))?;
        let rows = stmt.query_map(params![limit as i64], decode_audit_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// Look up one audit record by its id.
    pub fn audit(&self, id: Uuid) -> Result<Option<AuditRecord>> {
        self.conn
            .query_row(
                &format!("{AUDIT_SELECT} WHERE id = ?1"),
                params![id.to_string()],
                decode_audit_row,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn stats(&self) -> Result<Stats> {
        let active_identities: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM identities WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?;
        let total_submissions: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT image_ref, submitted_at FROM audit_records)",
            [],
            |row| row.get(0),
        )?;
        let (total_decisions, matches_found): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(outcome = 'MATCH'), 0) FROM audit_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let match_rate = if total_decisions > 0 {
            (matches_found as f64 / total_decisions as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Ok(Stats {
            active_identities: active_identities as u64,
            total_submissions: total_submissions as u64,
            total_decisions: total_decisions as u64,
            matches_found: matches_found as u64,
            match_rate,
        })
    }
}

impl AuditSink for SqliteStore {
    type Error = StoreError;

    fn append(&self, record: &AuditRecord) -> Result<()> {
        self.append_audit(record)
    }
}

fn decode_audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRecord> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })?;

    let outcome: String = row.get(4)?;
    let outcome: MatchOutcome = outcome.parse().map_err(|msg: String| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, msg.into())
    })?;

    Ok(AuditRecord {
        id,
        image_ref: row.get(1)?,
        image_digest: row.get(2)?,
        face_index: row.get::<_, Option<i64>>(3)?.map(|i| i as usize),
        outcome,
        identity_id: row.get::<_, Option<i64>>(5)?.map(IdentityId),
        distance: row.get::<_, Option<f64>>(6)?.map(|d| d as f32),
        confidence: row.get::<_, Option<f64>>(7)?.map(|c| c as f32),
        tolerance: row.get::<_, f64>(8)? as f32,
        decided_at: parse_timestamp(row, 9)?,
        submitted_at: parse_timestamp(row, 10)?,
        recorded_at: parse_timestamp(row, 11)?,
    })
}
