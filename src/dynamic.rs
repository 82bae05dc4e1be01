// ABOUTME: Decodes any wire value into the dynamic Value type.
// ABOUTME: Also the generic path behind cast errors and skipped struct fields.

use crate::big::{parse_big_decimal, parse_big_int};
use crate::decode::{Decode, Kind};
use crate::decoder::{Decoder, LongType, MapType, RealType, PREALLOC_LIMIT};
use crate::error::Error;
use crate::refer::Reference;
use crate::tags::tag;
use crate::value::{Cycle, Value};
use std::collections::BTreeMap;
use std::rc::Rc;

impl Decoder<'_> {
    /// Decode the value introduced by `tag` without a static destination type.
    pub fn read_value(&mut self, tag: u8) -> Value {
        if tag::is_digit(tag) {
            return Value::Int(i64::from(tag::digit_value(tag)));
        }
        match tag {
            tag::NULL => Value::Null,
            tag::EMPTY => Value::String(String::new()),
            tag::TRUE => Value::Bool(true),
            tag::FALSE => Value::Bool(false),
            tag::INTEGER => Value::Int(self.read_i64()),
            tag::LONG => self.read_long_value(),
            tag::NAN => self.read_nan_value(),
            tag::INFINITY => self.read_infinity_value(),
            tag::DOUBLE => self.read_double_value(),
            tag::DATE | tag::TIME => self.read_temporal(tag).map_or(Value::Null, Value::DateTime),
            tag::GUID => Value::Uuid(self.read_guid()),
            tag::UTF8_CHAR => Value::String(self.read_utf16(1)),
            tag::STRING => Value::String(self.read_string()),
            tag::BYTES => Value::Bytes(self.read_bytes()),
            tag::LIST => self.read_list_value(),
            tag::MAP => self.read_map_value(),
            tag::OBJECT => self.read_object_value(),
            tag::REF => self.read_ref_value(),
            tag::CLASS => {
                self.read_class();
                let tag = self.next_tag();
                self.read_value(tag)
            }
            tag::ERROR => {
                let mut message = String::new();
                self.decode(&mut message);
                self.set_error(Error::Remote(message));
                Value::Null
            }
            _ => {
                self.set_error(Error::InvalidTag(tag));
                Value::Null
            }
        }
    }

    fn read_long_value(&mut self) -> Value {
        match self.config().long_type {
            LongType::Int64 => Value::Int(self.read_i64()),
            LongType::Uint64 => Value::UInt(self.read_u64()),
            LongType::BigInt => {
                let text = self.read_number_text();
                match parse_big_int(&text) {
                    Some(n) => Value::BigInt(n),
                    None => {
                        self.parse_error(&text, "BigInt");
                        Value::Null
                    }
                }
            }
        }
    }

    fn read_nan_value(&mut self) -> Value {
        match self.config().real_type {
            RealType::Float32 => Value::Float32(f32::NAN),
            RealType::Float64 => Value::Float(f64::NAN),
            RealType::BigFloat => {
                self.parse_error("NaN", "BigDecimal");
                Value::Null
            }
        }
    }

    fn read_infinity_value(&mut self) -> Value {
        let f = if self.next_byte() == tag::NEG {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        match self.config().real_type {
            #[allow(clippy::cast_possible_truncation)]
            RealType::Float32 => Value::Float32(f as f32),
            RealType::Float64 => Value::Float(f),
            RealType::BigFloat => {
                self.cast_error("f64", "BigDecimal");
                Value::Null
            }
        }
    }

    fn read_double_value(&mut self) -> Value {
        match self.config().real_type {
            RealType::Float32 => Value::Float32(self.read_f32()),
            RealType::Float64 => Value::Float(self.read_f64()),
            RealType::BigFloat => {
                let text = self.read_number_text();
                match parse_big_decimal(&text) {
                    Some(n) => Value::BigFloat(n),
                    None => {
                        self.parse_error(&text, "BigDecimal");
                        Value::Null
                    }
                }
            }
        }
    }

    fn read_list_value(&mut self) -> Value {
        let count = self.read_count();
        let slot = self.reserve_reference();
        let items = Rc::new_cyclic(|this| {
            self.set_building(slot, || Value::Cycle(Cycle::List(this.clone())));
            let mut items = Vec::with_capacity(count.min(PREALLOC_LIMIT));
            for _ in 0..count {
                if self.error().is_some() {
                    break;
                }
                let tag = self.next_tag();
                items.push(self.read_value(tag));
            }
            items
        });
        self.expect(tag::CLOSEBRACE);
        let value = Value::List(items);
        self.set_reference(slot, || value.clone());
        value
    }

    fn read_map_value(&mut self) -> Value {
        let count = self.read_count();
        let slot = self.reserve_reference();
        let value = match self.config().map_type {
            MapType::Dynamic => Value::Map(Rc::new_cyclic(|this| {
                self.set_building(slot, || Value::Cycle(Cycle::Map(this.clone())));
                let mut pairs = Vec::with_capacity(count.min(PREALLOC_LIMIT));
                for _ in 0..count {
                    if self.error().is_some() {
                        break;
                    }
                    let key = self.decode_value();
                    let value = self.decode_value();
                    pairs.push((key, value));
                }
                pairs
            })),
            MapType::StringKeyed => Value::Object(Rc::new_cyclic(|this| {
                self.set_building(slot, || Value::Cycle(Cycle::Object(this.clone())));
                let mut map = BTreeMap::new();
                for _ in 0..count {
                    if self.error().is_some() {
                        break;
                    }
                    let key: String = self.read();
                    let value = self.decode_value();
                    map.insert(key, value);
                }
                map
            })),
        };
        self.expect(tag::CLOSEBRACE);
        self.set_reference(slot, || value.clone());
        value
    }

    fn read_object_value(&mut self) -> Value {
        let Some(schema) = self.read_object_header() else {
            return Value::Null;
        };
        let slot = self.reserve_reference();
        let fields = Rc::new_cyclic(|this| {
            self.set_building(slot, || Value::Cycle(Cycle::Object(this.clone())));
            let mut map = BTreeMap::new();
            for name in schema.field_names() {
                if self.error().is_some() {
                    break;
                }
                let value = self.decode_value();
                map.insert(name.clone(), value);
            }
            map
        });
        self.expect(tag::CLOSEBRACE);
        let value = Value::Object(fields);
        self.set_reference(slot, || value.clone());
        value
    }

    fn read_ref_value(&mut self) -> Value {
        match self.read_reference_or_cycle() {
            Some(Reference::Building(edge)) => edge,
            Some(entry) => entry.value().cloned().unwrap_or_default(),
            None => Value::Null,
        }
    }
}

impl Decode for Value {
    const KIND: Kind = Kind::Dynamic;

    fn zero() -> Self {
        Value::Null
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        *self = dec.read_value(tag);
    }

    #[allow(clippy::cast_possible_wrap)]
    fn from_index(index: usize) -> Option<Self> {
        Some(Value::Int(index as i64))
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn type_name() -> String {
        "Value".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecoderConfig;
    use crate::hprose;
    use bigdecimal::BigDecimal;
    use num_bigint::BigInt;
    use std::str::FromStr;

    fn decode_with(input: &[u8], config: DecoderConfig) -> (Value, Option<Error>) {
        let mut dec = Decoder::with_config(input, config);
        let value = dec.decode_value();
        (value, dec.take_error())
    }

    fn decode(input: &[u8]) -> Value {
        let (value, err) = decode_with(input, DecoderConfig::default());
        assert!(err.is_none(), "{err:?}");
        value
    }

    #[test]
    fn test_scalars() {
        assert_eq!(decode(b"7"), Value::Int(7));
        assert_eq!(decode(b"n"), Value::Null);
        assert_eq!(decode(b"e"), Value::from(""));
        assert_eq!(decode(b"t"), Value::Bool(true));
        assert_eq!(decode(b"i-12;"), Value::Int(-12));
        assert_eq!(decode(b"l1234567890123;"), Value::Int(1_234_567_890_123));
        assert_eq!(decode(b"d2.5;"), Value::Float(2.5));
        assert_eq!(decode(b"I-"), Value::Float(f64::NEG_INFINITY));
        assert_eq!(decode(b"u\xc3\xa9"), Value::from("é"));
        assert_eq!(decode(b"b3\"\x00\x01\x02\""), Value::Bytes(vec![0, 1, 2]));
    }

    #[test]
    fn test_nan() {
        match decode(b"N") {
            Value::Float(f) => assert!(f.is_nan()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_long_type_modes() {
        let config = DecoderConfig {
            long_type: LongType::Uint64,
            ..DecoderConfig::default()
        };
        let (value, _) = decode_with(b"l18446744073709551615;", config);
        assert_eq!(value, Value::UInt(u64::MAX));

        let config = DecoderConfig {
            long_type: LongType::BigInt,
            ..DecoderConfig::default()
        };
        let (value, _) = decode_with(b"l123456789012345678901234567890;", config);
        assert_eq!(
            value,
            Value::BigInt(BigInt::from_str("123456789012345678901234567890").unwrap())
        );
    }

    #[test]
    fn test_real_type_modes() {
        let config = DecoderConfig {
            real_type: RealType::Float32,
            ..DecoderConfig::default()
        };
        let (value, _) = decode_with(b"d0.5;", config);
        assert_eq!(value, Value::Float32(0.5));

        let config = DecoderConfig {
            real_type: RealType::BigFloat,
            ..DecoderConfig::default()
        };
        let (value, _) = decode_with(b"d3.14159265358979323846;", config.clone());
        assert_eq!(
            value,
            Value::BigFloat(BigDecimal::from_str("3.14159265358979323846").unwrap())
        );
        let (_, err) = decode_with(b"N", config);
        assert_eq!(err.map(|e| e.error_type()), Some("parse"));
    }

    #[test]
    fn test_containers() {
        let value = decode(b"a3{1s1\"x\"a0{}}");
        assert_eq!(value, hprose!([1, "x", []]));

        let value = decode(b"m2{s1\"k\"1i2;t}");
        assert_eq!(
            value,
            Value::map(vec![
                (Value::from("k"), Value::Int(1)),
                (Value::Int(2), Value::Bool(true)),
            ])
        );
    }

    #[test]
    fn test_string_keyed_maps() {
        let config = DecoderConfig {
            map_type: MapType::StringKeyed,
            ..DecoderConfig::default()
        };
        let (value, err) = decode_with(b"m2{s1\"k\"1i2;t}", config);
        assert!(err.is_none());
        assert_eq!(value, hprose!({ "k": 1, "2": true }));
    }

    #[test]
    fn test_references_resolve_to_copies() {
        let mut dec = Decoder::new(b"a2{s2\"ab\"r1;}r0;");
        let list = dec.decode_value();
        assert_eq!(list, hprose!(["ab", "ab"]));
        assert_eq!(dec.decode_value(), list);
    }

    fn back_edge(value: &Value) -> &Cycle {
        match value {
            Value::Cycle(edge) => edge,
            other => panic!("expected a back edge, got {other:?}"),
        }
    }

    #[test]
    fn test_self_referencing_list() {
        let list = decode(b"a2{1r0;}");
        let items = list.as_list().unwrap();
        assert_eq!(items[0], Value::Int(1));
        let edge = back_edge(&items[1]);
        assert!(edge.points_to(&list));
        assert!(edge.upgrade().is_some_and(|v| edge.points_to(&v)));
    }

    #[test]
    fn test_back_edge_to_grandparent() {
        let outer = decode(b"a1{a1{r0;}}");
        let inner = &outer.as_list().unwrap()[0];
        let edge = back_edge(&inner.as_list().unwrap()[0]);
        assert!(edge.points_to(&outer));
        assert!(!edge.points_to(inner));
    }

    #[test]
    fn test_self_referencing_map_and_object() {
        let map = decode(b"m1{s4\"self\"r0;}");
        let Value::Map(pairs) = &map else {
            panic!("expected a map, got {map:?}");
        };
        assert!(back_edge(&pairs[0].1).points_to(&map));

        // Field names take slots 0 and 1, the object takes slot 2.
        let node = decode(b"c4\"Node\"2{s5\"label\"s4\"next\"}o0{s1\"a\"r2;}");
        assert_eq!(node.get_key("label"), Some(&Value::from("a")));
        assert!(back_edge(node.get_key("next").unwrap()).points_to(&node));
    }

    #[test]
    fn test_finished_container_reference_shares_storage() {
        let mut dec = Decoder::new(b"a1{r0;}r0;");
        let first = dec.decode_value();
        let second = dec.decode_value();
        assert!(dec.error().is_none());
        match (&first, &second) {
            (Value::List(a), Value::List(b)) => assert!(Rc::ptr_eq(a, b)),
            other => panic!("expected lists, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_count_stops_at_first_error() {
        let mut dec = Decoder::new(b"a20000000{");
        let value = dec.decode_value();
        assert_eq!(dec.error(), Some(&Error::Eof));
        assert!(value.as_list().is_some_and(|items| items.len() <= 1));

        let mut dec = Decoder::new(b"m9000000{");
        let value = dec.decode_value();
        assert_eq!(dec.error(), Some(&Error::Eof));
        assert!(matches!(value, Value::Map(pairs) if pairs.len() <= 1));
    }

    #[test]
    fn test_remote_error() {
        let (_, err) = decode_with(b"Es4\"boom\"", DecoderConfig::default());
        assert_eq!(err, Some(Error::Remote("boom".into())));
    }

    #[test]
    fn test_invalid_tag() {
        let (value, err) = decode_with(b"x", DecoderConfig::default());
        assert_eq!(value, Value::Null);
        assert_eq!(err, Some(Error::InvalidTag(b'x')));
    }
}
