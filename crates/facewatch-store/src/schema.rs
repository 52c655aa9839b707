/// Schema applied on every open. Statements are idempotent.
///
/// `audit_records` rejects UPDATE and DELETE at the storage layer.
pub(crate) const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS identities (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    alias       TEXT,
    case_type   TEXT NOT NULL,
    description TEXT,
    image_ref   TEXT,
    enrolled_at TEXT NOT NULL,
    is_active   INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS reference_vectors (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_id INTEGER NOT NULL REFERENCES identities(id),
    dimension   INTEGER NOT NULL,
    vector      BLOB NOT NULL,
    added_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reference_vectors_identity
    ON reference_vectors(identity_id);

CREATE TABLE IF NOT EXISTS audit_records (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    id           TEXT NOT NULL UNIQUE,
    image_ref    TEXT NOT NULL,
    image_digest TEXT,
    face_index   INTEGER,
    outcome      TEXT NOT NULL,
    identity_id  INTEGER REFERENCES identities(id),
    distance     REAL,
    confidence   REAL,
    tolerance    REAL NOT NULL,
    decided_at   TEXT NOT NULL,
    submitted_at TEXT NOT NULL,
    recorded_at  TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS audit_records_no_update
BEFORE UPDATE ON audit_records
BEGIN
    SELECT RAISE(ABORT, 'audit records are append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_records_no_delete
BEFORE DELETE ON audit_records
BEGIN
    SELECT RAISE(ABORT, 'audit records are append-only');
END;
";
