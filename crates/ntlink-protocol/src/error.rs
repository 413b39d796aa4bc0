//! Error types for the protocol layer.
//!
//! Each crate in ntlink defines its own error enum. A `ProtocolError`
//! always means the problem is in encoding or decoding, never in
//! networking or topic bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a control-plane batch to JSON failed.
    #[error("json encode failed: {0}")]
    JsonEncode(serde_json::Error),

    /// A control-plane frame is not valid JSON, or not a JSON array.
    #[error("json decode failed: {0}")]
    JsonDecode(serde_json::Error),

    /// Packing value records failed.
    #[error("msgpack encode failed: {0}")]
    PackEncode(rmp_serde::encode::Error),

    /// A value-plane frame is not a valid MessagePack stream.
    #[error("msgpack decode failed: {0}")]
    PackDecode(rmp_serde::decode::Error),

    /// The message parsed but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A value record is well-formed MessagePack but not a valid record,
    /// e.g. the payload does not fit the declared type index.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A type name or type index outside the type table.
    #[error("unknown value type: {0}")]
    UnknownType(String),
}
