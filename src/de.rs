// ABOUTME: Serde integration: drives any Deserialize type from a decoded dynamic value.
// ABOUTME: Also implements Serialize and Deserialize for Value so it interoperates with other formats.

use crate::decoder::{Decoder, DecoderConfig};
use crate::error::{Error, Result};
use crate::value::Value;
use num_traits::ToPrimitive;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde::{forward_to_deserialize_any, Deserialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::rc::Rc;

/// A serde Deserializer over an owned [`Value`].
pub struct Deserializer {
    value: Value,
}

impl Deserializer {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Decode one dynamic value from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns the first error the decode session recorded.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Self::from_decoder(Decoder::new(data))
    }

    /// Decode one dynamic value from a byte slice with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error the decode session recorded.
    pub fn from_slice_with_config(data: &[u8], config: DecoderConfig) -> Result<Self> {
        Self::from_decoder(Decoder::with_config(data, config))
    }

    fn from_decoder(mut decoder: Decoder<'_>) -> Result<Self> {
        let value = decoder.decode_value();
        match decoder.take_error() {
            Some(err) => Err(err),
            None => Ok(Self::new(value)),
        }
    }

    /// Get the underlying value (consumes self).
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Deserialize a value from an hprose byte slice.
///
/// # Errors
///
/// Returns an error if:
/// - The data is malformed or truncated
/// - The data doesn't match the expected type `T`
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    T::deserialize(Deserializer::from_slice(data)?)
}

/// Deserialize a value from an hprose byte slice with custom configuration.
///
/// # Errors
///
/// Returns an error if the data is malformed or doesn't match `T`.
pub fn from_slice_with_config<T: DeserializeOwned>(data: &[u8], config: DecoderConfig) -> Result<T> {
    T::deserialize(Deserializer::from_slice_with_config(data, config)?)
}

/// Deserialize a value pulled from a reader.
///
/// # Errors
///
/// Returns an error if the reader fails, the data is malformed, or it doesn't match `T`.
pub fn from_reader<R: Read, T: DeserializeOwned>(reader: R) -> Result<T> {
    T::deserialize(Deserializer::from_decoder(Decoder::from_reader(reader))?)
}

/// Deserialize a `T` from an already decoded value.
///
/// # Errors
///
/// Returns an error if the value's shape doesn't match `T`.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(Deserializer::new(value))
}

fn invalid_type(value: &Value, exp: &dyn de::Expected) -> Error {
    de::Error::invalid_type(de::Unexpected::Other(value.kind_name()), exp)
}

impl<'de> de::Deserializer<'de> for Deserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(n) => visitor.visit_i64(n),
            Value::UInt(n) => visitor.visit_u64(n),
            Value::Float32(f) => visitor.visit_f32(f),
            Value::Float(f) => visitor.visit_f64(f),
            Value::BigInt(n) => {
                // Try to convert to a native type
                if let Some(i) = n.to_i64() {
                    visitor.visit_i64(i)
                } else if let Some(u) = n.to_u64() {
                    visitor.visit_u64(u)
                } else {
                    visitor.visit_string(n.to_string())
                }
            }
            Value::BigFloat(d) => match d.to_f64() {
                Some(f) => visitor.visit_f64(f),
                None => visitor.visit_string(d.to_string()),
            },
            Value::BigRational(r) => visitor.visit_string(r.to_string()),
            Value::Complex(c) => visitor.visit_string(c.to_string()),
            Value::String(s) => visitor.visit_string(s),
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::Uuid(u) => visitor.visit_string(u.hyphenated().to_string()),
            Value::DateTime(t) => visitor.visit_string(t.to_rfc3339()),
            Value::List(items) => visitor.visit_seq(SeqDeserializer::new(Rc::unwrap_or_clone(items))),
            Value::Map(pairs) => visitor.visit_map(MapDeserializer::new(Rc::unwrap_or_clone(pairs))),
            Value::Object(fields) => visitor.visit_map(MapDeserializer::new(
                Rc::unwrap_or_clone(fields)
                    .into_iter()
                    .map(|(k, v)| (Value::String(k), v))
                    .collect(),
            )),
            Value::Cycle(_) => Err(Error::Custom("cyclic value cannot be deserialized".into())),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::String(s) => visitor.visit_byte_buf(s.into_bytes()),
            Value::Uuid(u) => visitor.visit_bytes(u.as_bytes()),
            Value::Null => visitor.visit_byte_buf(Vec::new()),
            other => de::Deserializer::deserialize_any(Deserializer::new(other), visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let (variant, value) = match self.value {
            // Unit variant: just a string
            Value::String(s) => (Value::String(s), None),
            Value::Map(pairs) if pairs.len() == 1 => {
                let mut pairs = Rc::unwrap_or_clone(pairs).into_iter();
                match pairs.next() {
                    Some((k, v)) => (k, Some(v)),
                    None => return Err(Error::Custom("expected string or map for enum".into())),
                }
            }
            Value::Object(fields) if fields.len() == 1 => match Rc::unwrap_or_clone(fields).into_iter().next() {
                Some((k, v)) => (Value::String(k), Some(v)),
                None => return Err(Error::Custom("expected string or map for enum".into())),
            },
            other => return Err(invalid_type(&other, &"string or single-entry map")),
        };
        visitor.visit_enum(EnumDeserializer { variant, value })
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        drop(self);
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        unit unit_struct seq tuple tuple_struct map struct identifier
    }
}

impl<'de> IntoDeserializer<'de, Error> for Value {
    type Deserializer = Deserializer;

    fn into_deserializer(self) -> Deserializer {
        Deserializer::new(self)
    }
}

struct SeqDeserializer {
    iter: std::vec::IntoIter<Value>,
}

impl SeqDeserializer {
    fn new(items: Vec<Value>) -> Self {
        SeqDeserializer {
            iter: items.into_iter(),
        }
    }
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.iter.next() {
            Some(value) => seed.deserialize(Deserializer::new(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: std::vec::IntoIter<(Value, Value)>,
    value: Option<Value>,
}

impl MapDeserializer {
    fn new(pairs: Vec<(Value, Value)>) -> Self {
        MapDeserializer {
            iter: pairs.into_iter(),
            value: None,
        }
    }
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(Deserializer::new(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        match self.value.take() {
            Some(value) => seed.deserialize(Deserializer::new(value)),
            None => Err(Error::Custom("map value requested before its key".into())),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: Value,
    value: Option<Value>,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer {
    type Error = Error;
    type Variant = VariantDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let variant = seed.deserialize(Deserializer::new(self.variant))?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer {
    value: Option<Value>,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            None | Some(Value::Null) => Ok(()),
            Some(other) => Err(invalid_type(&other, &"unit variant")),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        match self.value {
            Some(value) => seed.deserialize(Deserializer::new(value)),
            None => Err(Error::Custom("expected newtype variant".into())),
        }
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        match self.value {
            Some(Value::List(items)) => visitor.visit_seq(SeqDeserializer::new(Rc::unwrap_or_clone(items))),
            Some(other) => Err(invalid_type(&other, &"tuple variant")),
            None => Err(Error::Custom("expected tuple variant".into())),
        }
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Some(value @ (Value::Map(_) | Value::Object(_))) => {
                de::Deserializer::deserialize_any(Deserializer::new(value), visitor)
            }
            Some(other) => Err(invalid_type(&other, &"struct variant")),
            None => Err(Error::Custom("expected struct variant".into())),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::UInt(n) => serializer.serialize_u64(*n),
            Value::Float32(f) => serializer.serialize_f32(*f),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::BigInt(n) => match n.to_i64() {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.collect_str(n),
            },
            Value::BigFloat(d) => serializer.collect_str(d),
            Value::BigRational(r) => serializer.collect_str(r),
            Value::Complex(c) => serializer.collect_str(c),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Uuid(u) => serializer.collect_str(&u.hyphenated()),
            Value::DateTime(t) => serializer.serialize_str(&t.to_rfc3339()),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (k, v) in pairs.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Cycle(_) => Err(serde::ser::Error::custom("cyclic value cannot be serialized")),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any hprose value")
    }

    fn visit_bool<E>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f32<E>(self, v: f32) -> std::result::Result<Value, E> {
        Ok(Value::Float32(v))
    }

    fn visit_f64<E>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_unit<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: de::Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::list(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut pairs: Vec<(Value, Value)> = Vec::new();
        while let Some(entry) = map.next_entry()? {
            pairs.push(entry);
        }
        // String-keyed maps become objects, matching the dynamic decoder.
        if pairs.iter().all(|(k, _)| matches!(k, Value::String(_))) {
            let mut fields = BTreeMap::new();
            for (k, v) in pairs {
                if let Value::String(k) = k {
                    fields.insert(k, v);
                }
            }
            return Ok(Value::object(fields));
        }
        Ok(Value::map(pairs))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> std::result::Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hprose;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: u32,
        tags: Vec<String>,
        nickname: Option<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Shape {
        Empty,
        Circle(f64),
        Rect { w: i32, h: i32 },
    }

    #[test]
    fn test_struct_from_map() {
        let input = b"m4{s4\"name\"s3\"Tom\"s3\"age\"i30;s4\"tags\"a2{uas2\"bc\"}s8\"nickname\"n}";
        let p: Person = from_slice(input).unwrap();
        assert_eq!(
            p,
            Person {
                name: "Tom".into(),
                age: 30,
                tags: vec!["a".into(), "bc".into()],
                nickname: None,
            }
        );
    }

    #[test]
    fn test_struct_from_object() {
        let input = b"c6\"Person\"4{s4\"name\"s3\"age\"s4\"tags\"s8\"nickname\"}o0{s3\"Ann\"5a{}s3\"Nan\"}";
        let p: Person = from_slice(input).unwrap();
        assert_eq!(p.name, "Ann");
        assert_eq!(p.age, 5);
        assert_eq!(p.nickname.as_deref(), Some("Nan"));
    }

    #[test]
    fn test_references_are_resolved_before_serde() {
        let v: Vec<String> = from_slice(b"a3{s2\"hi\"r1;r1;}").unwrap();
        assert_eq!(v, vec!["hi", "hi", "hi"]);
    }

    #[test]
    fn test_enums() {
        assert_eq!(from_slice::<Shape>(b"s5\"Empty\"").unwrap(), Shape::Empty);
        assert_eq!(
            from_slice::<Shape>(b"m1{s6\"Circle\"d1.5;}").unwrap(),
            Shape::Circle(1.5)
        );
        assert_eq!(
            from_slice::<Shape>(b"m1{s4\"Rect\"m2{uw2uh3}}").unwrap(),
            Shape::Rect { w: 2, h: 3 }
        );
    }

    #[test]
    fn test_decode_errors_surface() {
        let err = from_slice::<Vec<i32>>(b"a2{1").unwrap_err();
        assert!(err.is_eof());
        assert!(from_slice::<String>(b"i1;").is_err());
    }

    #[test]
    fn test_from_reader() {
        let data: &[u8] = b"m1{s3\"key\"l9000000000;}";
        let m: HashMap<String, i64> = from_reader(data).unwrap();
        assert_eq!(m["key"], 9_000_000_000);
    }

    #[test]
    fn test_value_round_trips_through_serde_json() {
        let value = hprose!({"a": [1, "x", null], "b": true});
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({"a": [1, "x", null], "b": true}));
        let back: Value = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_value_deserializer() {
        let v: (u8, String) = from_value(hprose!([7, "z"])).unwrap();
        assert_eq!(v, (7, "z".to_string()));
    }
}
