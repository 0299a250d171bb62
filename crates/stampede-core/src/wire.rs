//! Serializer pipeline: encodes an `Envelope<T>` to the bytes a
//! byte-oriented backend stores, and decodes them back.
//!
//! Wire format: `<ascii-json metadata> 0x7C <serialized payload bytes>`.
//! The metadata prefix is always plain JSON of two numbers, so it's
//! always ASCII and never itself contains the separator byte; decoding
//! splits on the *first* `0x7C` in the buffer.

use crate::envelope::{Envelope, Metadata, CURRENT_SCHEMA_VERSION};
use crate::error::{CacheError, Result};
use crate::traits::Serializer;
use serde::de::DeserializeOwned;
use serde::Serialize;

const SEPARATOR: u8 = b'|';

/// Encode an envelope to backend-ready bytes.
pub fn encode<S: Serializer, T: Serialize>(serializer: &S, envelope: &Envelope<T>) -> Result<Vec<u8>> {
    let meta_json =
        serde_json::to_vec(&envelope.metadata).map_err(|e| CacheError::Serialization(e.to_string()))?;
    let payload = serializer.serialize(&envelope.payload)?;

    let mut out = Vec::with_capacity(meta_json.len() + 1 + payload.len());
    out.extend_from_slice(&meta_json);
    out.push(SEPARATOR);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode raw backend bytes into an envelope.
///
/// Returns `Ok(None)` when the envelope's schema version doesn't match
/// [`CURRENT_SCHEMA_VERSION`] or the deserializer reports the payload
/// can't be deserialized as `T` — both are treated as a cache miss, never
/// surfaced as an error, so a type or schema change self-heals on the
/// next write. A corrupt metadata prefix is a different kind of failure
/// (the bytes aren't a well-formed envelope at all, regardless of `T`)
/// and propagates.
pub fn decode<S: Serializer, T: DeserializeOwned>(serializer: &S, bytes: &[u8]) -> Result<Option<Envelope<T>>> {
    let idx = bytes
        .iter()
        .position(|&b| b == SEPARATOR)
        .ok_or_else(|| CacheError::Deserialization("missing metadata separator".into()))?;

    let meta_bytes = &bytes[..idx];
    let payload_bytes = &bytes[idx + 1..];

    let metadata: Metadata = serde_json::from_slice(meta_bytes)
        .map_err(|e| CacheError::Deserialization(format!("corrupt envelope metadata: {e}")))?;

    if metadata.v != CURRENT_SCHEMA_VERSION {
        return Ok(None);
    }

    match serializer.deserialize::<T>(payload_bytes) {
        Ok(payload) => Ok(Some(Envelope { payload, metadata })),
        Err(CacheError::CannotDeserialize(_)) => Ok(None),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::JsonSerializer;

    #[test]
    fn roundtrip() {
        let serializer = JsonSerializer;
        let env = Envelope::wrap(vec![1, 2, 3], 42.0);

        let bytes = encode(&serializer, &env).unwrap();
        let decoded: Envelope<Vec<i32>> = decode(&serializer, &bytes).unwrap().unwrap();

        assert_eq!(decoded.payload, vec![1, 2, 3]);
        assert_eq!(decoded.metadata.ct, 42.0);
    }

    #[test]
    fn version_mismatch_is_none_not_error() {
        let serializer = JsonSerializer;
        let mut bytes = serde_json::to_vec(&Metadata {
            ct: 1.0,
            v: CURRENT_SCHEMA_VERSION + 1,
        })
        .unwrap();
        bytes.push(b'|');
        bytes.extend_from_slice(b"1");

        let decoded: Option<Envelope<i32>> = decode(&serializer, &bytes).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn schema_drift_payload_is_none_not_error() {
        let serializer = JsonSerializer;
        let mut bytes = serde_json::to_vec(&Metadata {
            ct: 1.0,
            v: CURRENT_SCHEMA_VERSION,
        })
        .unwrap();
        bytes.push(b'|');
        // A JSON object where a plain integer is expected.
        bytes.extend_from_slice(b"{\"unexpected\":true}");

        let decoded: Option<Envelope<i32>> = decode(&serializer, &bytes).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn missing_separator_is_an_error() {
        let serializer = JsonSerializer;
        let decoded: Result<Option<Envelope<i32>>> = decode(&serializer, b"no-separator-here");
        assert!(decoded.is_err());
    }
}
