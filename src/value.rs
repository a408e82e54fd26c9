//! Value tree for dynamically typed protocol payloads.
//!
//! Both codecs decode into [`Value`] through the same serde impls, so a
//! message looks identical to the rest of the crate regardless of whether it
//! arrived as JSON or MsgPack.
//!
//! # Example
//!
//! ```
//! use shellwire::value::{Map, Value};
//!
//! let mut map = Map::new();
//! map.insert("k".to_string(), Value::Array(vec![true.into(), Value::Null]));
//! let tuple = Value::Array(vec![1i64.into(), "a".into(), Value::Map(map)]);
//!
//! assert_eq!(tuple.as_array().unwrap()[0].as_i64(), Some(1));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

/// String-keyed map of values. Key order carries no meaning.
pub type Map = BTreeMap<String, Value>;

/// A dynamically typed protocol value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Nil / null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// IEEE double.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// String-keyed map.
    Map(Map),
    /// Wire value outside the kinds above, carried through untouched.
    Opaque(Opaque),
}

/// Raw payload of a wire type the value tree does not model.
///
/// MsgPack `bin` values have no `ext_type`; MsgPack extension values keep
/// their type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    /// Extension type tag, if this was an extension value.
    pub ext_type: Option<i8>,
    /// Raw bytes.
    pub data: Vec<u8>,
}

impl Value {
    /// Name of this value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Opaque(_) => "opaque",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Float value; integers widen to `f64`.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key if this is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            // JSON has no NaN or infinity; serde_json would write `null`.
            Value::Float(f) if !f.is_finite() && serializer.is_human_readable() => Err(
                ser::Error::custom(format!("non-finite float {} has no JSON form", f)),
            ),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Opaque(opaque) => match opaque.ext_type {
                // rmp-serde writes this newtype as a MsgPack extension value.
                Some(tag) => serializer.serialize_newtype_struct(
                    rmp_serde::MSGPACK_EXT_STRUCT_NAME,
                    &(tag, serde_bytes::Bytes::new(&opaque.data)),
                ),
                None => serializer.serialize_bytes(&opaque.data),
            },
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a protocol value")
    }

    fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Int(n))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Value, E> {
        i64::try_from(n)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {} does not fit in 64-bit signed", n)))
    }

    fn visit_f64<E>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Str(s.to_string()))
    }

    fn visit_string<E>(self, s: String) -> Result<Value, E> {
        Ok(Value::Str(s))
    }

    fn visit_bytes<E>(self, data: &[u8]) -> Result<Value, E> {
        Ok(Value::Opaque(Opaque {
            ext_type: None,
            data: data.to_vec(),
        }))
    }

    fn visit_byte_buf<E>(self, data: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Opaque(Opaque {
            ext_type: None,
            data,
        }))
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    // rmp-serde hands extension values over as a newtype of (tag, bytes).
    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<Value, D::Error> {
        let (tag, data): (i8, serde_bytes::ByteBuf) = Deserialize::deserialize(deserializer)?;
        Ok(Value::Opaque(Opaque {
            ext_type: Some(tag),
            data: data.into_vec(),
        }))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::new();
        while let Some((MapKey(k), v)) = access.next_entry::<MapKey, Value>()? {
            map.insert(k, v);
        }
        Ok(Value::Map(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Map key on the wire. Integer keys are normalized to their decimal form.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = MapKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or integer map key")
            }

            fn visit_str<E>(self, s: &str) -> Result<MapKey, E> {
                Ok(MapKey(s.to_string()))
            }

            fn visit_string<E>(self, s: String) -> Result<MapKey, E> {
                Ok(MapKey(s))
            }

            fn visit_i64<E>(self, n: i64) -> Result<MapKey, E> {
                Ok(MapKey(n.to_string()))
            }

            fn visit_u64<E>(self, n: u64) -> Result<MapKey, E> {
                Ok(MapKey(n.to_string()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Value {
        let mut inner = Map::new();
        inner.insert(
            "k".to_string(),
            Value::Array(vec![Value::Bool(true), Value::Null]),
        );
        Value::Array(vec![Value::Int(1), Value::from("a"), Value::Map(inner)])
    }

    #[test]
    fn test_accessors() {
        let v = nested();
        let items = v.as_array().unwrap();
        assert_eq!(items[0].as_i64(), Some(1));
        assert_eq!(items[1].as_str(), Some("a"));
        assert_eq!(
            items[2].get("k").unwrap().as_array().unwrap()[0].as_bool(),
            Some(true)
        );
        assert!(items[0].as_str().is_none());
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_json_preserves_integer_kind() {
        let v: Value = serde_json::from_str(r#"[1, 1.0, "a"]"#).unwrap();
        let items = v.as_array().unwrap();
        assert_eq!(items[0], Value::Int(1));
        assert_eq!(items[1], Value::Float(1.0));
    }

    #[test]
    fn test_json_roundtrip() {
        let v = nested();
        let text = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_u64_overflow_is_rejected() {
        let result: std::result::Result<Value, _> = serde_json::from_str("18446744073709551615");
        assert!(result.is_err());

        let max: Value = serde_json::from_str("9223372036854775807").unwrap();
        assert_eq!(max, Value::Int(i64::MAX));
    }

    #[test]
    fn test_msgpack_binary_is_opaque() {
        let bytes = rmp_serde::to_vec(&serde_bytes::Bytes::new(&[1, 2, 3])).unwrap();
        let v: Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(
            v,
            Value::Opaque(Opaque {
                ext_type: None,
                data: vec![1, 2, 3]
            })
        );

        let again = rmp_serde::to_vec(&v).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_msgpack_integer_keys_normalized() {
        let mut source = std::collections::HashMap::new();
        source.insert(3i64, "b1");
        let bytes = rmp_serde::to_vec(&source).unwrap();

        let v: Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(v.get("3").and_then(Value::as_str), Some("b1"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(nested().kind(), "array");
        assert_eq!(Value::Map(Map::new()).kind(), "map");
    }
}
