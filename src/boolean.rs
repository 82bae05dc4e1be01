// ABOUTME: Boolean destination decoding.
// ABOUTME: Numeric payloads use textual truthiness instead of a full numeric parse.

use crate::decode::{Decode, Kind};
use crate::decoder::Decoder;
use crate::numeric::parse_bool;
use crate::tags::tag;
use crate::value::Value;

/// False only for an empty payload or a lone `0`.
#[inline]
fn is_truthy(raw: &[u8]) -> bool {
    !(raw.is_empty() || raw == b"0")
}

impl Decode for bool {
    const KIND: Kind = Kind::Bool;

    fn zero() -> Self {
        false
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if tag::is_digit(tag) {
            *self = tag != b'0';
            return;
        }
        match tag {
            tag::NULL | tag::EMPTY | tag::FALSE => *self = false,
            tag::TRUE | tag::NAN => *self = true,
            tag::INTEGER | tag::LONG | tag::DOUBLE => *self = is_truthy(dec.until(tag::SEMICOLON)),
            tag::INFINITY => {
                dec.skip();
                *self = true;
            }
            tag::UTF8_CHAR | tag::STRING => {
                let text = dec.read_text(tag);
                match parse_bool(&text) {
                    Some(b) => *self = b,
                    None => dec.parse_error(&text, "bool"),
                }
            }
            _ => dec.default_decode(self, tag),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(false),
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            Value::UInt(n) => Some(*n != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Float32(f) => Some(*f != 0.0),
            Value::String(s) => parse_bool(s),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn type_name() -> String {
        "bool".into()
    }
}
