//! Typed values carried by value records.

use crate::{ProtocolError, ValueType};

/// A dynamically-typed sample payload.
///
/// The variant always agrees with a type index: `String` covers both
/// `string` and `json` topics, `Raw` covers every opaque-bytes type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Double(f64),
    Int(i64),
    Float(f32),
    String(String),
    Raw(Vec<u8>),
    BooleanArray(Vec<bool>),
    DoubleArray(Vec<f64>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f32>),
    StringArray(Vec<String>),
}

impl Value {
    /// The type index this value is sent with.
    pub fn type_index(&self) -> u8 {
        self.canonical_type().type_index()
    }

    /// The canonical [`ValueType`] for this variant.
    pub fn canonical_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Double(_) => ValueType::Double,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Raw(_) => ValueType::Raw,
            Value::BooleanArray(_) => ValueType::BooleanArray,
            Value::DoubleArray(_) => ValueType::DoubleArray,
            Value::IntArray(_) => ValueType::IntArray,
            Value::FloatArray(_) => ValueType::FloatArray,
            Value::StringArray(_) => ValueType::StringArray,
        }
    }

    /// Returns `true` if this value may be sent on a topic of type `ty`.
    pub fn fits(&self, ty: ValueType) -> bool {
        self.type_index() == ty.type_index()
    }

    /// Returns the value as `f64` for the numeric scalar variants.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(v) => Some(v),
            Value::Float(v) => Some(f64::from(v)),
            Value::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Returns the string payload of a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to the MessagePack representation used on the wire.
    pub fn to_msgpack(&self) -> rmpv::Value {
        use rmpv::Value as Mp;
        match self {
            Value::Boolean(v) => Mp::Boolean(*v),
            Value::Double(v) => Mp::F64(*v),
            Value::Int(v) => Mp::from(*v),
            Value::Float(v) => Mp::F32(*v),
            Value::String(v) => Mp::from(v.as_str()),
            Value::Raw(v) => Mp::Binary(v.clone()),
            Value::BooleanArray(v) => {
                Mp::Array(v.iter().map(|b| Mp::Boolean(*b)).collect())
            }
            Value::DoubleArray(v) => {
                Mp::Array(v.iter().map(|d| Mp::F64(*d)).collect())
            }
            Value::IntArray(v) => {
                Mp::Array(v.iter().map(|i| Mp::from(*i)).collect())
            }
            Value::FloatArray(v) => {
                Mp::Array(v.iter().map(|f| Mp::F32(*f)).collect())
            }
            Value::StringArray(v) => {
                Mp::Array(v.iter().map(|s| Mp::from(s.as_str())).collect())
            }
        }
    }

    /// Interprets a MessagePack payload according to a record's type index.
    ///
    /// Numeric scalars are read leniently: a `double` topic accepts an
    /// integer or `f32` payload, since producers in other languages do not
    /// always pick the exact width.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownType`] for an index outside the table,
    /// [`ProtocolError::InvalidRecord`] when the payload does not fit.
    pub fn from_msgpack(
        type_index: u8,
        raw: rmpv::Value,
    ) -> Result<Value, ProtocolError> {
        let ty = ValueType::from_index(type_index)
            .ok_or_else(|| ProtocolError::UnknownType(type_index.to_string()))?;
        let mismatch =
            || ProtocolError::InvalidRecord(format!("payload does not fit type {ty}"));

        let value = match ty {
            ValueType::Boolean => Value::Boolean(raw.as_bool().ok_or_else(mismatch)?),
            ValueType::Double => Value::Double(mp_f64(&raw).ok_or_else(mismatch)?),
            ValueType::Int => Value::Int(mp_i64(&raw).ok_or_else(mismatch)?),
            ValueType::Float => Value::Float(mp_f64(&raw).ok_or_else(mismatch)? as f32),
            ValueType::String => Value::String(mp_string(raw).ok_or_else(mismatch)?),
            ValueType::Raw => match raw {
                rmpv::Value::Binary(bytes) => Value::Raw(bytes),
                _ => return Err(mismatch()),
            },
            ValueType::BooleanArray => {
                Value::BooleanArray(mp_array(raw, |v| v.as_bool()).ok_or_else(mismatch)?)
            }
            ValueType::DoubleArray => {
                Value::DoubleArray(mp_array(raw, |v| mp_f64(&v)).ok_or_else(mismatch)?)
            }
            ValueType::IntArray => {
                Value::IntArray(mp_array(raw, |v| mp_i64(&v)).ok_or_else(mismatch)?)
            }
            ValueType::FloatArray => Value::FloatArray(
                mp_array(raw, |v| mp_f64(&v).map(|f| f as f32)).ok_or_else(mismatch)?,
            ),
            ValueType::StringArray => {
                Value::StringArray(mp_array(raw, mp_string).ok_or_else(mismatch)?)
            }
            // `from_index` only yields canonical types.
            ValueType::Json | ValueType::Rpc | ValueType::MsgPack | ValueType::Protobuf => {
                return Err(mismatch());
            }
        };
        Ok(value)
    }
}

fn mp_f64(v: &rmpv::Value) -> Option<f64> {
    match v {
        rmpv::Value::F64(f) => Some(*f),
        rmpv::Value::F32(f) => Some(f64::from(*f)),
        rmpv::Value::Integer(i) => i.as_f64(),
        _ => None,
    }
}

fn mp_i64(v: &rmpv::Value) -> Option<i64> {
    match v {
        rmpv::Value::Integer(i) => i.as_i64(),
        _ => None,
    }
}

fn mp_string(v: rmpv::Value) -> Option<String> {
    match v {
        rmpv::Value::String(s) => s.into_str(),
        _ => None,
    }
}

fn mp_array<T>(
    v: rmpv::Value,
    item: impl Fn(rmpv::Value) -> Option<T>,
) -> Option<Vec<T>> {
    match v {
        rmpv::Value::Array(items) => items.into_iter().map(item).collect(),
        _ => None,
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_accepts_shared_index() {
        // A string value may go out on a json topic; both use index 4.
        assert!(Value::from("{}").fits(ValueType::Json));
        assert!(Value::Raw(vec![1]).fits(ValueType::Protobuf));
        assert!(!Value::Int(1).fits(ValueType::Double));
    }

    #[test]
    fn test_from_msgpack_double_accepts_integer_payload() {
        let value = Value::from_msgpack(1, rmpv::Value::from(1500)).unwrap();
        assert_eq!(value, Value::Double(1500.0));
    }

    #[test]
    fn test_from_msgpack_int_rejects_float_payload() {
        let result = Value::from_msgpack(2, rmpv::Value::F64(1.5));
        assert!(matches!(result, Err(ProtocolError::InvalidRecord(_))));
    }

    #[test]
    fn test_from_msgpack_unknown_index_returns_error() {
        let result = Value::from_msgpack(9, rmpv::Value::Nil);
        assert!(matches!(result, Err(ProtocolError::UnknownType(_))));
    }

    #[test]
    fn test_from_msgpack_string_array() {
        let raw = rmpv::Value::Array(vec!["a".into(), "b".into()]);
        let value = Value::from_msgpack(20, raw).unwrap();
        assert_eq!(value, Value::StringArray(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_from_msgpack_array_with_wrong_element_returns_error() {
        let raw = rmpv::Value::Array(vec![rmpv::Value::Boolean(true), "x".into()]);
        assert!(Value::from_msgpack(16, raw).is_err());
    }

    #[test]
    fn test_to_msgpack_then_from_msgpack_preserves_raw_bytes() {
        let value = Value::Raw(vec![0, 255, 7]);
        let back = Value::from_msgpack(value.type_index(), value.to_msgpack()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_as_f64_covers_numeric_variants() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Boolean(true).as_f64(), None);
    }
}
