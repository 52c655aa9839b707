//! Boundaries to the systems the core depends on but does not own.

use crate::types::{Candidate, FeatureVector};

/// Extracts face feature vectors from raw image bytes.
///
/// Returns one vector per detected face; an empty list means no face was
/// found. Unreadable or corrupt input is an error, never an empty list.
pub trait FaceEncoder {
    type Error: std::error::Error + Send + Sync + 'static;

    fn encode(&self, image: &[u8]) -> Result<Vec<FeatureVector>, Self::Error>;
}

/// Source of enrolled reference vectors.
///
/// Implementations must return candidates in a stable order (enrollment
/// order) so that tie-breaks are reproducible.
pub trait IdentityRepository {
    type Error: std::error::Error + Send + Sync + 'static;

    fn list_enrolled(&self) -> Result<Vec<Candidate>, Self::Error>;
}

impl<T: FaceEncoder + ?Sized> FaceEncoder for &T {
    type Error = T::Error;

    fn encode(&self, image: &[u8]) -> Result<Vec<FeatureVector>, Self::Error> {
        (**self).encode(image)
    }
}

impl<T: IdentityRepository + ?Sized> IdentityRepository for &T {
    type Error = T::Error;

    fn list_enrolled(&self) -> Result<Vec<Candidate>, Self::Error> {
        (**self).list_enrolled()
    }
}
