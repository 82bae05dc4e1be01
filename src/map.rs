// ABOUTME: Associative destinations: HashMap and BTreeMap.
// ABOUTME: Accepts wire maps, lists keyed by position and objects keyed by field name.

use crate::decode::{Decode, Kind};
use crate::decoder::{Decoder, PREALLOC_LIMIT};
use crate::tags::tag;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// The operations the shared map decoder needs from a concrete map type.
trait MapSink<K, V>: Decode {
    fn with_capacity(n: usize) -> Self;
    fn put(&mut self, key: K, value: V);
}

impl<K: Decode + Eq + Hash, V: Decode> MapSink<K, V> for HashMap<K, V> {
    fn with_capacity(n: usize) -> Self {
        HashMap::with_capacity(n)
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Decode + Ord, V: Decode> MapSink<K, V> for BTreeMap<K, V> {
    fn with_capacity(_n: usize) -> Self {
        BTreeMap::new()
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

fn decode_map<M: MapSink<K, V>, K: Decode, V: Decode>(map: &mut M, dec: &mut Decoder<'_>, tag: u8) {
    match tag {
        tag::NULL | tag::EMPTY => *map = M::with_capacity(0),
        tag::MAP => {
            let count = dec.read_count();
            let slot = dec.reserve_reference();
            let mut out = M::with_capacity(count.min(PREALLOC_LIMIT));
            let mut pairs = Vec::new();
            for _ in 0..count {
                if dec.error().is_some() {
                    break;
                }
                let mut key = K::zero();
                let mut value = V::zero();
                let k = dec.decode_tracked(&mut key);
                let v = dec.decode_tracked(&mut value);
                if let (Some(k), Some(v)) = (k, v) {
                    pairs.push((k, v));
                }
                out.put(key, value);
            }
            dec.expect(tag::CLOSEBRACE);
            *map = out;
            dec.set_reference(slot, || Value::map(pairs));
        }
        tag::LIST if K::KIND.is_scalar_key() => {
            let count = dec.read_count();
            let slot = dec.reserve_reference();
            let mut out = M::with_capacity(count.min(PREALLOC_LIMIT));
            let mut values = Vec::new();
            for i in 0..count {
                if dec.error().is_some() {
                    break;
                }
                let mut value = V::zero();
                values.extend(dec.decode_tracked(&mut value));
                if let Some(key) = K::from_index(i) {
                    out.put(key, value);
                }
            }
            dec.expect(tag::CLOSEBRACE);
            *map = out;
            dec.set_reference(slot, || Value::list(values));
        }
        tag::OBJECT if K::KIND.is_string_or_dynamic() && V::KIND == Kind::Dynamic => {
            let Some(schema) = dec.read_object_header() else {
                return;
            };
            let slot = dec.reserve_reference();
            let names = schema.field_names();
            let mut out = M::with_capacity(names.len());
            let mut fields = BTreeMap::new();
            for name in names {
                if dec.error().is_some() {
                    break;
                }
                let mut value = V::zero();
                if let Some(v) = dec.decode_tracked(&mut value) {
                    fields.insert(name.clone(), v);
                }
                if let Some(key) = K::from_value(&Value::String(name.clone())) {
                    out.put(key, value);
                }
            }
            dec.expect(tag::CLOSEBRACE);
            *map = out;
            dec.set_reference(slot, || Value::object(fields));
        }
        _ => dec.default_decode(map, tag),
    }
}

/// Entries of a referenced map, object or positional list.
fn entries_from_value<K: Decode, V: Decode, M: FromIterator<(K, V)>>(value: &Value) -> Option<M> {
    match value {
        Value::Null => Some(std::iter::empty().collect()),
        Value::Map(pairs) => pairs
            .iter()
            .map(|(k, v)| Some((K::from_value(k)?, V::from_value(v)?)))
            .collect(),
        Value::Object(fields) => fields
            .iter()
            .map(|(k, v)| Some((K::from_value(&Value::String(k.clone()))?, V::from_value(v)?)))
            .collect(),
        Value::List(items) if K::KIND.is_scalar_key() => items
            .iter()
            .enumerate()
            .map(|(i, v)| Some((K::from_index(i)?, V::from_value(v)?)))
            .collect(),
        Value::Cycle(edge) => entries_from_value(&edge.upgrade()?),
        _ => None,
    }
}

fn map_value<'a, K: Decode, V: Decode>(entries: impl Iterator<Item = (&'a K, &'a V)>) -> Value {
    Value::map(entries.map(|(k, v)| (k.to_value(), v.to_value())).collect())
}

impl<K: Decode + Eq + Hash, V: Decode> Decode for HashMap<K, V> {
    const KIND: Kind = Kind::Map;

    fn zero() -> Self {
        HashMap::new()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        decode_map(self, dec, tag);
    }

    fn from_value(value: &Value) -> Option<Self> {
        entries_from_value(value)
    }

    fn to_value(&self) -> Value {
        map_value(self.iter())
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    const KIND: Kind = Kind::Map;

    fn zero() -> Self {
        BTreeMap::new()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        decode_map(self, dec, tag);
    }

    fn from_value(value: &Value) -> Option<Self> {
        entries_from_value(value)
    }

    fn to_value(&self) -> Value {
        map_value(self.iter())
    }
}
