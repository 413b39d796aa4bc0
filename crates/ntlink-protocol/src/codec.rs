//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The two planes of the protocol use two encodings: JSON for control
//! messages ([`JsonCodec`]) and MessagePack for value records
//! ([`MsgPackCodec`]). Both sit behind the same [`Codec`] trait so the
//! message modules only depend on "something that turns serde types into
//! bytes".

use std::io::Cursor;

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns an encode error if the value can't be represented in this
    /// format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns a decode error if the bytes are malformed, incomplete, or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`). Used for the control plane.
///
/// ```rust
/// use ntlink_protocol::{Codec, JsonCodec, SubUid};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&SubUid(3)).unwrap();
/// assert_eq!(bytes, b"3");
/// let back: SubUid = codec.decode(&bytes).unwrap();
/// assert_eq!(back, SubUid(3));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::JsonEncode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::JsonDecode)
    }
}

// ---------------------------------------------------------------------------
// MsgPackCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses MessagePack (via `rmp-serde`). Used for the value
/// plane.
///
/// Value frames carry several records back to back with no outer array, so
/// besides the single-value [`Codec`] methods this codec can read a whole
/// stream of concatenated values with [`MsgPackCodec::decode_stream`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Decodes every value packed back to back in `data`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::PackDecode`] if any value is malformed or
    /// truncated; nothing past a malformed value can be located reliably.
    pub fn decode_stream<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<Vec<T>, ProtocolError> {
        let mut de = rmp_serde::Deserializer::new(Cursor::new(data));
        let mut out = Vec::new();
        while (de.get_ref().position() as usize) < data.len() {
            let value = T::deserialize(&mut de).map_err(ProtocolError::PackDecode)?;
            out.push(value);
        }
        Ok(out)
    }
}

impl Codec for MsgPackCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        rmp_serde::to_vec(value).map_err(ProtocolError::PackEncode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        rmp_serde::from_slice(data).map_err(ProtocolError::PackDecode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_codec_decode_garbage_returns_error() {
        let result: Result<serde_json::Value, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::JsonDecode(_))));
    }

    #[test]
    fn test_msgpack_decode_stream_reads_concatenated_values() {
        let mut data = MsgPackCodec.encode(&(1i64, "a")).unwrap();
        data.extend(MsgPackCodec.encode(&(2i64, "b")).unwrap());

        let values: Vec<(i64, String)> = MsgPackCodec.decode_stream(&data).unwrap();
        assert_eq!(values, vec![(1, "a".to_string()), (2, "b".to_string())]);
    }

    #[test]
    fn test_msgpack_decode_stream_empty_frame_is_empty() {
        let values: Vec<i64> = MsgPackCodec.decode_stream(&[]).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_msgpack_decode_stream_truncated_returns_error() {
        let data = MsgPackCodec.encode(&(1i64, "abcdef")).unwrap();
        let result: Result<Vec<(i64, String)>, _> =
            MsgPackCodec.decode_stream(&data[..data.len() - 2]);
        assert!(matches!(result, Err(ProtocolError::PackDecode(_))));
    }
}
