// ABOUTME: Integer destination decoding for every fixed width, signed and unsigned.
// ABOUTME: Wire integers are read at 64 bits and truncated to the destination width.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use crate::decode::{Decode, Kind};
use crate::decoder::Decoder;
use crate::tags::tag;
use crate::value::Value;
use num_traits::ToPrimitive;

fn signed_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Null => Some(0),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Int(n) => Some(*n),
        Value::UInt(n) => Some(*n as i64),
        Value::Float(f) => Some(*f as i64),
        Value::Float32(f) => Some(*f as i64),
        Value::BigInt(n) => n.to_i64(),
        Value::String(s) => s.parse().ok(),
        Value::DateTime(t) => t.timestamp_nanos_opt(),
        _ => None,
    }
}

fn unsigned_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Null => Some(0),
        Value::Bool(b) => Some(u64::from(*b)),
        Value::Int(n) => Some(*n as u64),
        Value::UInt(n) => Some(*n),
        Value::Float(f) => Some(*f as u64),
        Value::Float32(f) => Some(*f as u64),
        Value::BigInt(n) => n.to_u64(),
        Value::String(s) => s.parse().ok(),
        Value::DateTime(t) => t.timestamp_nanos_opt().map(|n| n as u64),
        _ => None,
    }
}

/// Nanoseconds since the epoch for a Date or Time payload.
fn read_temporal_nanos(dec: &mut Decoder<'_>, tag: u8, target: &str) -> Option<i64> {
    let t = dec.read_temporal(tag)?;
    let nanos = t.timestamp_nanos_opt();
    if nanos.is_none() {
        dec.cast_error("DateTime", target);
    }
    nanos
}

macro_rules! impl_integer {
    ($($t:ty => $kind:ident, $wide:ty, $read:ident, $from_value:ident, $to_value:expr);* $(;)?) => {$(
        impl Decode for $t {
            const KIND: Kind = Kind::$kind;

            fn zero() -> Self {
                0
            }

            fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
                if tag::is_digit(tag) {
                    *self = tag::digit_value(tag) as $t;
                    return;
                }
                match tag {
                    tag::NULL | tag::EMPTY | tag::FALSE => *self = 0,
                    tag::TRUE => *self = 1,
                    tag::INTEGER | tag::LONG => *self = dec.$read() as $t,
                    tag::DOUBLE => *self = dec.read_f64() as $t,
                    tag::UTF8_CHAR | tag::STRING => {
                        let text = dec.read_text(tag);
                        match text.parse::<$wide>() {
                            Ok(n) => *self = n as $t,
                            Err(_) => dec.parse_error(&text, stringify!($t)),
                        }
                    }
                    tag::DATE | tag::TIME => {
                        if let Some(n) = read_temporal_nanos(dec, tag, stringify!($t)) {
                            *self = n as $t;
                        }
                    }
                    _ => dec.default_decode(self, tag),
                }
            }

            fn from_index(index: usize) -> Option<Self> {
                Some(index as $t)
            }

            fn from_value(value: &Value) -> Option<Self> {
                $from_value(value).map(|n| n as $t)
            }

            fn to_value(&self) -> Value {
                let f: fn($t) -> Value = $to_value;
                f(*self)
            }

            fn type_name() -> String {
                stringify!($t).into()
            }
        }
    )*};
}

impl_integer! {
    i8 => I8, i64, read_i64, signed_from_value, |n| Value::Int(i64::from(n));
    i16 => I16, i64, read_i64, signed_from_value, |n| Value::Int(i64::from(n));
    i32 => I32, i64, read_i64, signed_from_value, |n| Value::Int(i64::from(n));
    i64 => I64, i64, read_i64, signed_from_value, Value::Int;
    isize => Isize, i64, read_i64, signed_from_value, |n| Value::Int(n as i64);
    u8 => U8, u64, read_u64, unsigned_from_value, |n| Value::Int(i64::from(n));
    u16 => U16, u64, read_u64, unsigned_from_value, |n| Value::Int(i64::from(n));
    u32 => U32, u64, read_u64, unsigned_from_value, |n| Value::Int(i64::from(n));
    u64 => U64, u64, read_u64, unsigned_from_value, Value::from;
    usize => Usize, u64, read_u64, unsigned_from_value, |n| Value::from(n as u64);
}
