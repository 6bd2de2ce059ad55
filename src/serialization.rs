//! CBOR serialization for stored protocol blobs.
//!
//! Session purposes, signing results, and custom call payloads are persisted
//! as CBOR (NOT JSON): deterministic bytes for digesting, compact storage,
//! and schema evolution via `#[serde(default)]`.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// CBOR encoding failed.
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decoding failed: {0}")]
    Decode(String),
}

/// Serialize to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SerializationError::Encode(format!("{:?}", e)))?;
    Ok(bytes)
}

/// Deserialize from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    ciborium::from_reader(bytes).map_err(|e| SerializationError::Decode(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct StoredBlob {
        proposal_id: u64,
        decision: String,
        #[serde(default)]
        note: Option<String>,
    }

    #[test]
    fn cbor_roundtrip() {
        let original = StoredBlob {
            proposal_id: 7,
            decision: "approve".to_string(),
            note: None,
        };
        let bytes = to_cbor(&original).unwrap();
        let recovered: StoredBlob = from_cbor(&bytes).unwrap();
        assert_eq!(original, recovered);
    }

    #[test]
    fn decode_rejects_garbage() {
        let result: Result<StoredBlob, _> = from_cbor(&[0xff, 0x00, 0x13]);
        assert!(result.is_err());
    }
}
