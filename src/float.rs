// ABOUTME: Floating point destination decoding.
// ABOUTME: NaN and infinities arrive as dedicated tags, never as text.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use crate::decode::{Decode, Kind};
use crate::decoder::Decoder;
use crate::numeric::parse_f64;
use crate::tags::tag;
use crate::value::Value;

/// Read the sign byte that follows an infinity tag.
pub(crate) fn read_infinity(dec: &mut Decoder<'_>) -> f64 {
    if dec.next_byte() == tag::NEG {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    }
}

/// Shared coercion into an `f64`; `None` means the tag was not handled.
fn decode_f64(dec: &mut Decoder<'_>, tag: u8, target: &str) -> Option<Option<f64>> {
    if tag::is_digit(tag) {
        return Some(Some(f64::from(tag::digit_value(tag))));
    }
    let value = match tag {
        tag::NULL | tag::EMPTY | tag::FALSE => Some(0.0),
        tag::TRUE => Some(1.0),
        tag::INTEGER => Some(dec.read_i64() as f64),
        tag::LONG | tag::DOUBLE => Some(dec.read_f64()),
        tag::NAN => Some(f64::NAN),
        tag::INFINITY => Some(read_infinity(dec)),
        tag::UTF8_CHAR | tag::STRING => {
            let text = dec.read_text(tag);
            let parsed = parse_f64(&text);
            if parsed.is_none() {
                dec.parse_error(&text, target);
            }
            parsed
        }
        _ => return None,
    };
    Some(value)
}

fn float_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::String(s) => parse_f64(s),
        other => other.as_f64(),
    }
}

impl Decode for f64 {
    const KIND: Kind = Kind::F64;

    fn zero() -> Self {
        0.0
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        match decode_f64(dec, tag, "f64") {
            Some(Some(f)) => *self = f,
            Some(None) => {}
            None => dec.default_decode(self, tag),
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        Some(index as f64)
    }

    fn from_value(value: &Value) -> Option<Self> {
        float_from_value(value)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn type_name() -> String {
        "f64".into()
    }
}

impl Decode for f32 {
    const KIND: Kind = Kind::F32;

    fn zero() -> Self {
        0.0
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        // Long and double payloads are parsed at single precision directly.
        if tag == tag::LONG || tag == tag::DOUBLE {
            *self = dec.read_f32();
            return;
        }
        match decode_f64(dec, tag, "f32") {
            Some(Some(f)) => *self = f as f32,
            Some(None) => {}
            None => dec.default_decode(self, tag),
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        Some(index as f32)
    }

    fn from_value(value: &Value) -> Option<Self> {
        float_from_value(value).map(|f| f as f32)
    }

    fn to_value(&self) -> Value {
        Value::Float32(*self)
    }

    fn type_name() -> String {
        "f32".into()
    }
}
