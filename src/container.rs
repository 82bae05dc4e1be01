// ABOUTME: Sequence destinations: Vec, VecDeque, fixed arrays and sets.
// ABOUTME: A list registers itself before its elements so back-references see it in order.

use crate::bytes::{blob_from_value, bytes_value, decode_byte_array, decode_byte_vec};
use crate::decode::{Decode, Kind};
use crate::decoder::{Decoder, PREALLOC_LIMIT};
use crate::tags::tag;
use crate::value::Value;
use std::any::Any;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::hash::Hash;

/// Decoded elements plus their dynamic forms, kept only while references are tracked.
struct Elements<T> {
    items: Vec<T>,
    values: Vec<Value>,
}

impl<T: Decode> Elements<T> {
    fn with_capacity(count: usize) -> Self {
        Self {
            items: Vec::with_capacity(count.min(PREALLOC_LIMIT)),
            values: Vec::new(),
        }
    }

    /// Decode one element, returning false once the session has failed.
    fn push_next(&mut self, dec: &mut Decoder<'_>) -> bool {
        if dec.error().is_some() {
            return false;
        }
        let mut item = T::zero();
        if let Some(value) = dec.decode_tracked(&mut item) {
            self.values.push(value);
        }
        self.items.push(item);
        true
    }
}

/// Read the body of a list tag into a collection built by `collect`.
fn read_list<T: Decode, C>(dec: &mut Decoder<'_>, collect: impl FnOnce(Vec<T>) -> C) -> C {
    let count = dec.read_count();
    let slot = dec.reserve_reference();
    let mut elements = Elements::with_capacity(count);
    for _ in 0..count {
        if !elements.push_next(dec) {
            break;
        }
    }
    dec.expect(tag::CLOSEBRACE);
    let Elements { items, values } = elements;
    dec.set_reference(slot, || Value::list(values));
    collect(items)
}

/// Elements of a referenced list, or of a blob when the element type accepts bytes.
fn elements_from_value<T: Decode>(value: &Value) -> Option<Vec<T>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::List(items) => items.iter().map(T::from_value).collect(),
        Value::Cycle(edge) => elements_from_value(&edge.upgrade()?),
        Value::Bytes(b) => b
            .iter()
            .map(|&x| T::from_value(&Value::Int(i64::from(x))))
            .collect(),
        other if T::KIND == Kind::U8 => blob_from_value(other)?
            .into_iter()
            .map(|x| T::from_value(&Value::Int(i64::from(x))))
            .collect(),
        _ => None,
    }
}

fn list_value<'a, T: Decode>(items: impl Iterator<Item = &'a T>) -> Value {
    Value::list(items.map(T::to_value).collect())
}

impl<T: Decode> Decode for Vec<T> {
    const KIND: Kind = Kind::List;

    fn zero() -> Self {
        Vec::new()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if T::KIND == Kind::U8 && decode_byte_vec(self, dec, tag) {
            return;
        }
        match tag {
            tag::NULL | tag::EMPTY => self.clear(),
            tag::LIST => *self = read_list(dec, |items| items),
            _ => dec.default_decode(self, tag),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        elements_from_value(value)
    }

    fn to_value(&self) -> Value {
        bytes_value(self).unwrap_or_else(|| list_value(self.iter()))
    }
}

impl<T: Decode> Decode for VecDeque<T> {
    const KIND: Kind = Kind::List;

    fn zero() -> Self {
        VecDeque::new()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        match tag {
            tag::NULL | tag::EMPTY => self.clear(),
            tag::LIST => *self = read_list(dec, VecDeque::from),
            _ => dec.default_decode(self, tag),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        elements_from_value(value).map(VecDeque::from)
    }

    fn to_value(&self) -> Value {
        list_value(self.iter())
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    const KIND: Kind = Kind::Array;

    fn zero() -> Self {
        std::array::from_fn(|_| T::zero())
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if T::KIND == Kind::U8 && decode_byte_array(self, dec, tag) {
            return;
        }
        match tag {
            tag::NULL | tag::EMPTY => self.iter_mut().for_each(|item| *item = T::zero()),
            tag::LIST => {
                let count = dec.read_count();
                let slot = dec.reserve_reference();
                let mut values = Vec::new();
                for (i, item) in self.iter_mut().enumerate() {
                    *item = T::zero();
                    if i < count && dec.error().is_none() {
                        values.extend(dec.decode_tracked(item));
                    }
                }
                // Surplus elements are still consumed to keep the cursor in step.
                for _ in N..count {
                    if dec.error().is_some() {
                        break;
                    }
                    let mut scratch = T::zero();
                    values.extend(dec.decode_tracked(&mut scratch));
                }
                dec.expect(tag::CLOSEBRACE);
                dec.set_reference(slot, || Value::list(values));
            }
            _ => dec.default_decode(self, tag),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let mut items = elements_from_value::<T>(value)?.into_iter();
        Some(std::array::from_fn(|_| items.next().unwrap_or_else(T::zero)))
    }

    fn to_value(&self) -> Value {
        match (self as &dyn Any).downcast_ref::<[u8; N]>() {
            Some(bytes) => Value::Bytes(bytes.to_vec()),
            None => list_value(self.iter()),
        }
    }
}

impl<T: Decode + Eq + Hash> Decode for HashSet<T> {
    const KIND: Kind = Kind::Set;

    fn zero() -> Self {
        HashSet::new()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        match tag {
            tag::NULL | tag::EMPTY => self.clear(),
            tag::LIST => *self = read_list(dec, |items| items.into_iter().collect()),
            _ => dec.default_decode(self, tag),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        elements_from_value(value).map(|items| items.into_iter().collect())
    }

    fn to_value(&self) -> Value {
        list_value(self.iter())
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    const KIND: Kind = Kind::Set;

    fn zero() -> Self {
        BTreeSet::new()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        match tag {
            tag::NULL | tag::EMPTY => self.clear(),
            tag::LIST => *self = read_list(dec, |items| items.into_iter().collect()),
            _ => dec.default_decode(self, tag),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        elements_from_value(value).map(|items| items.into_iter().collect())
    }

    fn to_value(&self) -> Value {
        list_value(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::rc::Rc;

    fn decode<T: Decode>(input: &[u8]) -> (T, Option<Error>) {
        let mut dec = Decoder::new(input);
        let mut value = T::zero();
        dec.decode(&mut value);
        (value, dec.take_error())
    }

    #[test]
    fn test_vec() {
        assert_eq!(decode::<Vec<i32>>(b"a3{1i-2;d3.9;}"), (vec![1, -2, 3], None));
        assert_eq!(decode::<Vec<String>>(b"a2{s1\"a\"e}").0, vec!["a", ""]);
        assert_eq!(decode::<Vec<i32>>(b"n"), (vec![], None));
        assert_eq!(decode::<Vec<i32>>(b"e"), (vec![], None));
    }

    #[test]
    fn test_nested_lists_and_references() {
        let mut dec = Decoder::new(b"a2{a1{5}r1;}");
        let v: Vec<Vec<u8>> = dec.read();
        assert!(dec.error().is_none());
        assert_eq!(v, vec![vec![5], vec![5]]);
    }

    #[test]
    fn test_array_pads_short_lists() {
        let (a, err) = decode::<[i32; 5]>(b"a3{123}");
        assert!(err.is_none());
        assert_eq!(a, [1, 2, 3, 0, 0]);
    }

    #[test]
    fn test_array_discards_surplus_and_stays_in_step() {
        let mut dec = Decoder::new(b"a7{1234567}s4\"next\"");
        let a: [i32; 5] = dec.read();
        let next: String = dec.read();
        assert_eq!(a, [1, 2, 3, 4, 5]);
        assert_eq!(next, "next");
        assert!(dec.error().is_none());
    }

    #[test]
    fn test_array_surplus_strings_keep_reference_order() {
        let mut dec = Decoder::new(b"a3{s1\"a\"s1\"b\"s1\"c\"}r3;");
        let a: [String; 1] = dec.read();
        let last: String = dec.read();
        assert_eq!(a, ["a".to_string()]);
        assert_eq!(last, "c");
    }

    #[test]
    fn test_array_null_zero_fills() {
        let mut dec = Decoder::new(b"n");
        let mut a = [7u16; 3];
        dec.decode(&mut a);
        assert_eq!(a, [0, 0, 0]);
    }

    #[test]
    fn test_deque_and_sets() {
        assert_eq!(
            decode::<VecDeque<u8>>(b"a2{12}").0,
            VecDeque::from(vec![1, 2])
        );
        let (set, _) = decode::<BTreeSet<String>>(b"a3{s1\"b\"s1\"a\"r1;}");
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        let (set, _) = decode::<HashSet<i64>>(b"a3{112}");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_registered_list_shares_element_storage() {
        let mut dec = Decoder::new(b"a1{a2{12}}r0;r1;");
        let v: Vec<Vec<i32>> = dec.read();
        assert_eq!(v, vec![vec![1, 2]]);
        let outer = dec.decode_value();
        let inner = dec.decode_value();
        assert!(dec.error().is_none());
        assert_eq!(outer, crate::hprose!([[1, 2]]));
        match (&outer.as_list().unwrap()[0], &inner) {
            (Value::List(a), Value::List(b)) => assert!(Rc::ptr_eq(a, b)),
            other => panic!("expected lists, got {other:?}"),
        }
    }

    #[test]
    fn test_registered_list_keeps_wire_form() {
        let mut dec = Decoder::new(b"a1{s2\"12\"}r0;");
        let v: Vec<i32> = dec.read();
        assert_eq!(v, vec![12]);
        assert_eq!(dec.decode_value(), crate::hprose!(["12"]));
    }

    #[test]
    fn test_self_reference_into_typed_list_is_cyclic() {
        let (_, err) = decode::<Vec<Vec<i32>>>(b"a1{r0;}");
        assert_eq!(err, Some(Error::CyclicReference(0)));
    }

    #[test]
    fn test_truncated_count_stops_at_first_error() {
        let (v, err) = decode::<Vec<u8>>(b"a20000000{");
        assert_eq!(err, Some(Error::Eof));
        assert!(v.len() <= 1);

        let (_, err) = decode::<[i32; 2]>(b"a90000000{12");
        assert_eq!(err, Some(Error::Eof));

        let (set, err) = decode::<BTreeSet<String>>(b"a50000000{s1\"a\"");
        assert_eq!(err, Some(Error::Eof));
        assert!(set.len() <= 2);
    }

    #[test]
    fn test_map_into_list_is_cast_error() {
        let (_, err) = decode::<Vec<i32>>(b"m1{12}");
        assert_eq!(err, Some(Error::cast("map", "Vec<i32>")));
    }
}
