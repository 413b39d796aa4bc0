//! Identity types and the value-type table.
//!
//! Everything here travels on the wire, either inside JSON control messages
//! or as fields of packed value records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A server-assigned topic id.
///
/// `#[serde(transparent)]` keeps it a plain integer on the wire, both in
/// `announce` params and as the first element of a value record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TopicId(pub i64);

impl TopicId {
    /// The reserved time-sync channel. Both sides use it to exchange clock
    /// probes; it is never announced to consumers.
    pub const TIME: TopicId = TopicId(-1);

    /// Returns `true` for [`TopicId::TIME`].
    pub fn is_time(self) -> bool {
        self == Self::TIME
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "topic#{}", self.0)
    }
}

/// A publisher id the client assigns to a topic it owns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PubUid(pub i64);

impl fmt::Display for PubUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pub#{}", self.0)
    }
}

/// A subscriber id the client assigns to a held subscription.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubUid(pub i64);

impl fmt::Display for SubUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ValueType: the type table
// ---------------------------------------------------------------------------

/// The declared type of a topic.
///
/// On the control plane a type travels as its name (`"double"`,
/// `"string[]"`, ...). On the value plane it travels as a small integer
/// index. The mapping between the two is fixed and lives entirely in the
/// `match` arms below; several names share an index (`string`/`json`,
/// `raw`/`rpc`/`msgpack`/`protobuf`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    Boolean,
    Double,
    Int,
    Float,
    String,
    Json,
    Raw,
    Rpc,
    MsgPack,
    Protobuf,
    BooleanArray,
    DoubleArray,
    IntArray,
    FloatArray,
    StringArray,
}

impl ValueType {
    /// The type name used in control messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Double => "double",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Json => "json",
            ValueType::Raw => "raw",
            ValueType::Rpc => "rpc",
            ValueType::MsgPack => "msgpack",
            ValueType::Protobuf => "protobuf",
            ValueType::BooleanArray => "boolean[]",
            ValueType::DoubleArray => "double[]",
            ValueType::IntArray => "int[]",
            ValueType::FloatArray => "float[]",
            ValueType::StringArray => "string[]",
        }
    }

    /// The index used in binary value records.
    pub fn type_index(self) -> u8 {
        match self {
            ValueType::Boolean => 0,
            ValueType::Double => 1,
            ValueType::Int => 2,
            ValueType::Float => 3,
            ValueType::String | ValueType::Json => 4,
            ValueType::Raw
            | ValueType::Rpc
            | ValueType::MsgPack
            | ValueType::Protobuf => 5,
            ValueType::BooleanArray => 16,
            ValueType::DoubleArray => 17,
            ValueType::IntArray => 18,
            ValueType::FloatArray => 19,
            ValueType::StringArray => 20,
        }
    }

    /// Maps a record's type index back to a type. Shared indices resolve to
    /// their canonical name (`string` for 4, `raw` for 5).
    pub fn from_index(index: u8) -> Option<ValueType> {
        Some(match index {
            0 => ValueType::Boolean,
            1 => ValueType::Double,
            2 => ValueType::Int,
            3 => ValueType::Float,
            4 => ValueType::String,
            5 => ValueType::Raw,
            16 => ValueType::BooleanArray,
            17 => ValueType::DoubleArray,
            18 => ValueType::IntArray,
            19 => ValueType::FloatArray,
            20 => ValueType::StringArray,
            _ => return None,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "boolean" => ValueType::Boolean,
            "double" => ValueType::Double,
            "int" => ValueType::Int,
            "float" => ValueType::Float,
            "string" => ValueType::String,
            "json" => ValueType::Json,
            "raw" => ValueType::Raw,
            "rpc" => ValueType::Rpc,
            "msgpack" => ValueType::MsgPack,
            "protobuf" => ValueType::Protobuf,
            "boolean[]" => ValueType::BooleanArray,
            "double[]" => ValueType::DoubleArray,
            "int[]" => ValueType::IntArray,
            "float[]" => ValueType::FloatArray,
            "string[]" => ValueType::StringArray,
            // Schema-tagged payloads are opaque bytes to this client.
            s if s.starts_with("struct:") => ValueType::Raw,
            s if s.starts_with("proto:") => ValueType::Protobuf,
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        })
    }
}

impl TryFrom<String> for ValueType {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ValueType; 15] = [
        ValueType::Boolean,
        ValueType::Double,
        ValueType::Int,
        ValueType::Float,
        ValueType::String,
        ValueType::Json,
        ValueType::Raw,
        ValueType::Rpc,
        ValueType::MsgPack,
        ValueType::Protobuf,
        ValueType::BooleanArray,
        ValueType::DoubleArray,
        ValueType::IntArray,
        ValueType::FloatArray,
        ValueType::StringArray,
    ];

    #[test]
    fn test_topic_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&TopicId(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&TopicId::TIME).unwrap(), "-1");
    }

    #[test]
    fn test_id_display() {
        assert_eq!(TopicId(3).to_string(), "topic#3");
        assert_eq!(PubUid(4).to_string(), "pub#4");
        assert_eq!(SubUid(5).to_string(), "sub#5");
    }

    #[test]
    fn test_type_index_table() {
        assert_eq!(ValueType::Boolean.type_index(), 0);
        assert_eq!(ValueType::Double.type_index(), 1);
        assert_eq!(ValueType::Int.type_index(), 2);
        assert_eq!(ValueType::Float.type_index(), 3);
        assert_eq!(ValueType::String.type_index(), 4);
        assert_eq!(ValueType::Json.type_index(), 4);
        assert_eq!(ValueType::Raw.type_index(), 5);
        assert_eq!(ValueType::Rpc.type_index(), 5);
        assert_eq!(ValueType::MsgPack.type_index(), 5);
        assert_eq!(ValueType::Protobuf.type_index(), 5);
        assert_eq!(ValueType::BooleanArray.type_index(), 16);
        assert_eq!(ValueType::DoubleArray.type_index(), 17);
        assert_eq!(ValueType::IntArray.type_index(), 18);
        assert_eq!(ValueType::FloatArray.type_index(), 19);
        assert_eq!(ValueType::StringArray.type_index(), 20);
    }

    #[test]
    fn test_from_index_agrees_with_type_index() {
        for ty in ALL {
            let back = ValueType::from_index(ty.type_index()).unwrap();
            assert_eq!(back.type_index(), ty.type_index());
        }
    }

    #[test]
    fn test_from_index_shared_slots_resolve_to_canonical_name() {
        assert_eq!(ValueType::from_index(4), Some(ValueType::String));
        assert_eq!(ValueType::from_index(5), Some(ValueType::Raw));
        assert_eq!(ValueType::from_index(6), None);
    }

    #[test]
    fn test_names_parse_back() {
        for ty in ALL {
            assert_eq!(ty.as_str().parse::<ValueType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_value_type_serializes_as_name() {
        let json = serde_json::to_string(&ValueType::DoubleArray).unwrap();
        assert_eq!(json, "\"double[]\"");
    }

    #[test]
    fn test_schema_tagged_types_are_opaque() {
        assert_eq!("struct:Pose2d".parse::<ValueType>().unwrap(), ValueType::Raw);
        assert_eq!(
            "proto:Pose3d".parse::<ValueType>().unwrap(),
            ValueType::Protobuf
        );
    }

    #[test]
    fn test_unknown_type_name_returns_error() {
        let result: Result<ValueType, _> = serde_json::from_str("\"quaternion\"");
        assert!(result.is_err());
    }
}
