//! Binary value-plane records.
//!
//! A value frame is a packed sequence of MessagePack arrays, one per
//! record:
//!
//! ```text
//! [ topic id : int, timestamp µs : int, type index : int, value : any ]
//! ```

use serde::{Deserialize, Serialize};

use crate::{Codec, MsgPackCodec, ProtocolError, TopicId, Value};

/// One timestamped value for one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRecord {
    /// Server topic id for incoming records; the publisher id (or the
    /// reserved time id) for outgoing ones.
    pub id: TopicId,
    /// Producer-assigned timestamp in microseconds.
    pub timestamp_us: i64,
    /// The typed payload. Its variant determines the type index.
    pub value: Value,
}

impl ValueRecord {
    /// Creates a record.
    pub fn new(id: TopicId, timestamp_us: i64, value: Value) -> Self {
        Self {
            id,
            timestamp_us,
            value,
        }
    }

    /// The type index this record is sent with.
    pub fn type_index(&self) -> u8 {
        self.value.type_index()
    }
}

/// The on-wire tuple. A tuple struct serializes as a MessagePack array.
#[derive(Debug, Serialize, Deserialize)]
struct WireRecord(i64, i64, u8, rmpv::Value);

/// Packs records into one binary frame.
///
/// # Errors
/// Returns [`ProtocolError::PackEncode`] if packing fails.
pub fn encode_records(records: &[ValueRecord]) -> Result<Vec<u8>, ProtocolError> {
    let mut frame = Vec::new();
    for record in records {
        let wire = WireRecord(
            record.id.0,
            record.timestamp_us,
            record.type_index(),
            record.value.to_msgpack(),
        );
        frame.extend(MsgPackCodec.encode(&wire)?);
    }
    Ok(frame)
}

/// Unpacks every record in a binary frame.
///
/// The frame is first split into top-level MessagePack values; a value that
/// is not a valid record (wrong arity, wrong field types, payload that does
/// not fit its type index) is logged and skipped, and the remaining records
/// are still returned.
///
/// # Errors
/// Returns [`ProtocolError::PackDecode`] only if the frame itself is not a
/// well-formed MessagePack stream.
pub fn decode_records(frame: &[u8]) -> Result<Vec<ValueRecord>, ProtocolError> {
    let values: Vec<rmpv::Value> = MsgPackCodec.decode_stream(frame)?;
    let mut records = Vec::with_capacity(values.len());
    for value in values {
        match parse_record(value) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(error = %e, "skipping malformed value record"),
        }
    }
    Ok(records)
}

fn parse_record(value: rmpv::Value) -> Result<ValueRecord, ProtocolError> {
    let WireRecord(id, timestamp_us, type_index, raw) = rmpv::ext::from_value(value)
        .map_err(|e| ProtocolError::InvalidRecord(e.to_string()))?;
    Ok(ValueRecord {
        id: TopicId(id),
        timestamp_us,
        value: Value::from_msgpack(type_index, raw)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_decode_double_record() {
        let record = ValueRecord::new(TopicId(5), 1000, Value::Double(3.14));
        let frame = encode_records(std::slice::from_ref(&record)).unwrap();

        let decoded = decode_records(&frame).unwrap();
        assert_eq!(decoded, vec![record]);
        assert_eq!(decoded[0].type_index(), 1);
    }

    #[test]
    fn test_wire_shape_is_four_element_array() {
        let record = ValueRecord::new(TopicId(5), 1000, Value::Double(3.14));
        let frame = encode_records(&[record]).unwrap();

        let raw: rmpv::Value = rmpv::decode::read_value(&mut &frame[..]).unwrap();
        let items = raw.as_array().expect("record is an array");
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].as_i64(), Some(5));
        assert_eq!(items[1].as_i64(), Some(1000));
        assert_eq!(items[2].as_u64(), Some(1));
        assert_eq!(items[3].as_f64(), Some(3.14));
    }

    #[test]
    fn test_decode_multiple_records_in_one_frame() {
        let records = vec![
            ValueRecord::new(TopicId(1), 10, Value::Boolean(true)),
            ValueRecord::new(TopicId(2), 20, Value::from("hi")),
            ValueRecord::new(TopicId::TIME, 0, Value::Int(123_456)),
        ];
        let frame = encode_records(&records).unwrap();
        assert_eq!(decode_records(&frame).unwrap(), records);
    }

    #[test]
    fn test_decode_skips_record_with_mismatched_payload() {
        // A record claiming type "int" but carrying a string, sandwiched
        // between two good records.
        let mut frame =
            encode_records(&[ValueRecord::new(TopicId(1), 1, Value::Int(1))]).unwrap();
        frame.extend(
            MsgPackCodec
                .encode(&WireRecord(2, 2, 2, rmpv::Value::from("oops")))
                .unwrap(),
        );
        frame.extend(
            encode_records(&[ValueRecord::new(TopicId(3), 3, Value::Int(3))]).unwrap(),
        );

        let decoded = decode_records(&frame).unwrap();
        let ids: Vec<i64> = decoded.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_decode_skips_non_record_value() {
        let mut frame = MsgPackCodec.encode(&"not a record").unwrap();
        frame.extend(
            encode_records(&[ValueRecord::new(TopicId(9), 9, Value::Float(1.5))]).unwrap(),
        );
        let decoded = decode_records(&frame).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, TopicId(9));
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let result = decode_records(&[0xc1]); // never-used marker byte
        assert!(result.is_err());
    }
}
