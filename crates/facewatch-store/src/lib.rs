//! facewatch-store — SQLite persistence for enrolled identities and audit records.

mod audit_log;
mod schema;
mod store;

pub use audit_log::Stats;
pub use store::{Identity, NewIdentity, SqliteStore};

use facewatch_core::{IdentityId, VectorError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity not found: {0}")]
    IdentityNotFound(IdentityId),
    #[error("identity {0} is no longer active")]
    IdentityInactive(IdentityId),
    #[error("enrollment requires at least one reference vector")]
    NoReferenceVectors,
    #[error("reference vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("corrupt reference vector (row {row}): {source}")]
    CorruptVector {
        row: i64,
        #[source]
        source: VectorError,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
