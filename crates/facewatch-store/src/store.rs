use crate::schema::SCHEMA_SQL;
use crate::{Result, StoreError};
use chrono::{DateTime, Utc};
use facewatch_core::{Candidate, FeatureVector, IdentityId, IdentityRepository};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

/// Descriptive metadata for a new enrolled identity. Opaque to matching.
#[derive(Debug, Clone, Default)]
pub struct NewIdentity {
    pub name: String,
    pub alias: Option<String>,
    pub case_type: String,
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

/// An enrolled identity as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: IdentityId,
    pub name: String,
    pub alias: Option<String>,
    pub case_type: String,
    pub description: Option<String>,
    pub image_ref: Option<String>,
    pub enrolled_at: DateTime<Utc>,
    pub is_active: bool,
    pub reference_count: usize,
}

/// SQLite-backed identity repository and audit sink.
pub struct SqliteStore {
    pub(crate) conn: Connection,
}

impl SqliteStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened store");
        Self::init(conn)
    }

    /// Open a private, non-persistent store.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", 1)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Enroll a new identity with one or more reference vectors.
    pub fn enroll(&self, identity: &NewIdentity, vectors: &[FeatureVector]) -> Result<IdentityId> {
        let first = vectors.first().ok_or(StoreError::NoReferenceVectors)?;
        if let Some(odd) = vectors.iter().find(|v| v.len() != first.len()) {
            return Err(StoreError::DimensionMismatch {
                expected: first.len(),
                actual: odd.len(),
            });
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO identities (name, alias, case_type, description, image_ref, enrolled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                identity.name,
                identity.alias,
                identity.case_type,
                identity.description,
                identity.image_ref,
                now
            ],
        )?;
        let id = IdentityId(tx.last_insert_rowid());

        for vector in vectors {
            insert_vector(&tx, id, vector, &now)?;
        }
        tx.commit()?;

        tracing::info!(
            identity = %id,
            name = %identity.name,
            references = vectors.len(),
            "identity enrolled"
        );
        Ok(id)
    }

    /// Add another reference vector (re-enrollment) to an active identity.
    pub fn add_reference(&self, id: IdentityId, vector: &FeatureVector) -> Result<()> {
        let identity = self.identity(id)?.ok_or(StoreError::IdentityNotFound(id))?;
        if !identity.is_active {
            return Err(StoreError::IdentityInactive(id));
        }

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT dimension FROM reference_vectors WHERE identity_id = ?1 LIMIT 1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(dim) = existing {
            if dim as usize != vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: dim as usize,
                    actual: vector.len(),
                });
            }
        }

        insert_vector(&self.conn, id, vector, &Utc::now().to_rfc3339())?;
        tracing::info!(identity = %id, "reference vector added");
        Ok(())
    }

    /// Soft-delete: the identity stops being matched but its audit history stays.
    ///
    /// Returns false when the identity does not exist or was already inactive.
    pub fn deactivate(&self, id: IdentityId) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE identities SET is_active = 0 WHERE id = ?1 AND is_active = 1",
            params![id.0],
        )?;
        if changed > 0 {
            tracing::info!(identity = %id, "identity deactivated");
        }
        Ok(changed > 0)
    }

    pub fn identity(&self, id: IdentityId) -> Result<Option<Identity>> {
        self.conn
            .query_row(
                &format!("{IDENTITY_SELECT} WHERE i.id = ?1 GROUP BY i.id"),
                params![id.0],
                decode_identity_row,
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// Active identities, most recently enrolled first.
    pub fn list_identities(&self) -> Result<Vec<Identity>> {
        let mut stmt = self.conn.prepare(&format!(
            "{IDENTITY_SELECT} WHERE i.is_active = 1 GROUP BY i.id ORDER BY i.id DESC"
        ))?;
        let rows = stmt.query_map([], decode_identity_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// Reference vectors of all active identities in insertion order.
    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.identity_id, r.vector
             FROM reference_vectors r
             JOIN identities i ON i.id = r.identity_id
             WHERE i.is_active = 1
             ORDER BY r.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(row, identity_id, blob)| {
                let vector = FeatureVector::from_le_bytes(&blob)
                    .map_err(|source| StoreError::CorruptVector { row, source })?;
                Ok(Candidate::new(IdentityId(identity_id), vector))
            })
            .collect()
    }
}

impl IdentityRepository for SqliteStore {
    type Error = StoreError;

    fn list_enrolled(&self) -> Result<Vec<Candidate>> {
        self.candidates()
    }
}

const IDENTITY_SELECT: &str = "
    SELECT i.id, i.name, i.alias, i.case_type, i.description, i.image_ref,
           i.enrolled_at, i.is_active, COUNT(r.id)
    FROM identities i
    LEFT JOIN reference_vectors r ON r.identity_id = i.id";

fn insert_vector(
    conn: &Connection,
    id: IdentityId,
    vector: &FeatureVector,
    added_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO reference_vectors (identity_id, dimension, vector, added_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![id.0, vector.len() as i64, vector.to_le_bytes(), added_at],
    )?;
    Ok(())
}

fn decode_identity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: IdentityId(row.get(0)?),
        name: row.get(1)?,
        alias: row.get(2)?,
        case_type: row.get(3)?,
        description: row.get(4)?,
        image_ref: row.get(5)?,
        enrolled_at: parse_timestamp(row, 6)?,
        is_active: row.get(7)?,
        reference_count: row.get::<_, i64>(8)? as usize,
    })
}

pub(crate) fn parse_timestamp(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            let source = Box::new(err);
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, source)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(values: &[f32]) -> FeatureVector {
        FeatureVector::new(values.to_vec()).unwrap()
    }

    fn subject(name: &str) -> NewIdentity {
        NewIdentity {
            name: name.into(),
            case_type: "fraud".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_enroll_and_fetch() {
        let store = SqliteStore::open_in_memory().unwrap();
        let new = NewIdentity {
            name: "Jane Roe".into(),
            alias: Some("JR".into()),
            case_type: "burglary".into(),
            description: Some("seen downtown".into()),
            image_ref: Some("jane.jpg".into()),
        };
        let id = store.enroll(&new, &[fv(&[0.1, 0.2]), fv(&[0.3, 0.4])]).unwrap();

        let identity = store.identity(id).unwrap().unwrap();
        assert_eq!(identity.name, "Jane Roe");
        assert_eq!(identity.alias.as_deref(), Some("JR"));
        assert_eq!(identity.case_type, "burglary");
        assert_eq!(identity.image_ref.as_deref(), Some("jane.jpg"));
        assert!(identity.is_active);
        assert_eq!(identity.reference_count, 2);
    }

    #[test]
    fn test_enroll_requires_vectors() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.enroll(&subject("a"), &[]).unwrap_err();
        assert!(matches!(err, StoreError::NoReferenceVectors));
    }

    #[test]
    fn test_enroll_rejects_mixed_dimensions() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .enroll(&subject("a"), &[fv(&[0.1, 0.2]), fv(&[0.1])])
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 2, actual: 1 }));
        assert!(store.list_identities().unwrap().is_empty());
    }

    #[test]
    fn test_candidates_in_enrollment_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.enroll(&subject("a"), &[fv(&[1.0, 0.0])]).unwrap();
        let b = store.enroll(&subject("b"), &[fv(&[0.0, 1.0])]).unwrap();
        store.add_reference(a, &fv(&[0.5, 0.5])).unwrap();

        let candidates = store.list_enrolled().unwrap();
        let ids: Vec<_> = candidates.iter().map(|c| c.identity_id).collect();
        assert_eq!(ids, vec![a, b, a]);
        assert_eq!(candidates[2].vector.as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn test_deactivate_hides_identity() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.enroll(&subject("a"), &[fv(&[1.0])]).unwrap();
        let b = store.enroll(&subject("b"), &[fv(&[2.0])]).unwrap();

        assert!(store.deactivate(a).unwrap());
        assert!(!store.deactivate(a).unwrap());
        assert!(!store.deactivate(IdentityId(999)).unwrap());

        let candidates = store.list_enrolled().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].identity_id, b);

        let listed: Vec<_> = store.list_identities().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(listed, vec![b]);
        assert!(!store.identity(a).unwrap().unwrap().is_active);
    }

    #[test]
    fn test_add_reference_checks_identity() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.add_reference(IdentityId(5), &fv(&[1.0])).unwrap_err();
        assert!(matches!(err, StoreError::IdentityNotFound(IdentityId(5))));

        let a = store.enroll(&subject("a"), &[fv(&[1.0, 2.0])]).unwrap();
        let err = store.add_reference(a, &fv(&[1.0])).unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 2, actual: 1 }));

        store.deactivate(a).unwrap();
        let err = store.add_reference(a, &fv(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(err, StoreError::IdentityInactive(_)));
    }

    #[test]
    fn test_list_identities_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.enroll(&subject("a"), &[fv(&[1.0])]).unwrap();
        let b = store.enroll(&subject("b"), &[fv(&[2.0])]).unwrap();
        let listed: Vec<_> = store.list_identities().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(listed, vec![b, a]);
    }

    #[test]
    fn test_corrupt_vector_blob() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.enroll(&subject("a"), &[fv(&[1.0])]).unwrap();
        store
            .conn
            .execute(
                "UPDATE reference_vectors SET vector = X'0102' WHERE identity_id = ?1",
                params![a.0],
            )
            .unwrap();
        let err = store.list_enrolled().unwrap_err();
        assert!(matches!(err, StoreError::CorruptVector { .. }));
    }
}
