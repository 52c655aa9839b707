//! Adapter for the external face encoder's JSON output.
//!
//! The encoder writes one JSON array per submission containing one feature
//! vector per detected face, e.g. `[[0.01, -0.12, ...], [...]]`. An empty
//! array means no face was found.

use facewatch_core::{FaceEncoder, FeatureVector};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("unreadable encoder output: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub struct JsonEncoder;

impl FaceEncoder for JsonEncoder {
    type Error = EncodeError;

    fn encode(&self, image: &[u8]) -> Result<Vec<FeatureVector>, EncodeError> {
        Ok(serde_json::from_slice(image)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_faces() {
        let faces = JsonEncoder.encode(b"[[0.1, 0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[1].as_slice(), &[0.3, 0.4]);
    }

    #[test]
    fn test_no_face_is_empty_not_error() {
        assert!(JsonEncoder.encode(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_input_is_error() {
        assert!(JsonEncoder.encode(b"\x89PNG\r\n").is_err());
        assert!(JsonEncoder.encode(b"[[]]").is_err());
        assert!(JsonEncoder.encode(b"{\"faces\": 1}").is_err());
    }
}
