// ABOUTME: Complex number destination decoding.
// ABOUTME: Real-valued wire payloads land in the real part; text accepts "a+bi" with optional parentheses.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use crate::decode::{Decode, Kind};
use crate::decoder::Decoder;
use crate::float::read_infinity;
use crate::numeric::parse_f64;
use crate::tags::tag;
use crate::value::Value;
use num_complex::{Complex, Complex32, Complex64};
use std::str::FromStr;

fn parse_complex(text: &str) -> Option<Complex64> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    Complex64::from_str(inner)
        .ok()
        .or_else(|| parse_f64(inner).map(|re| Complex::new(re, 0.0)))
}

fn decode_complex(dec: &mut Decoder<'_>, tag: u8, target: &str) -> Option<Option<Complex64>> {
    if tag::is_digit(tag) {
        return Some(Some(Complex::new(f64::from(tag::digit_value(tag)), 0.0)));
    }
    let real = |re: f64| Some(Complex::new(re, 0.0));
    let value = match tag {
        tag::NULL | tag::EMPTY | tag::FALSE => real(0.0),
        tag::TRUE => real(1.0),
        tag::NAN => real(f64::NAN),
        tag::INTEGER => real(dec.read_i64() as f64),
        tag::LONG | tag::DOUBLE => real(dec.read_f64()),
        tag::INFINITY => real(read_infinity(dec)),
        tag::UTF8_CHAR | tag::STRING => {
            let text = dec.read_text(tag);
            let parsed = parse_complex(&text);
            if parsed.is_none() {
                dec.parse_error(&text, target);
            }
            parsed
        }
        _ => return None,
    };
    Some(value)
}

fn complex_from_value(value: &Value) -> Option<Complex64> {
    match value {
        Value::Complex(c) => Some(*c),
        Value::String(s) => parse_complex(s),
        Value::Null => Some(Complex::new(0.0, 0.0)),
        other => other.as_f64().map(|re| Complex::new(re, 0.0)),
    }
}

impl Decode for Complex64 {
    const KIND: Kind = Kind::Complex128;

    fn zero() -> Self {
        Complex::new(0.0, 0.0)
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        match decode_complex(dec, tag, "Complex<f64>") {
            Some(Some(c)) => *self = c,
            Some(None) => {}
            None => dec.default_decode(self, tag),
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        Some(Complex::new(index as f64, 0.0))
    }

    fn from_value(value: &Value) -> Option<Self> {
        complex_from_value(value)
    }

    fn to_value(&self) -> Value {
        Value::Complex(*self)
    }
}

impl Decode for Complex32 {
    const KIND: Kind = Kind::Complex64;

    fn zero() -> Self {
        Complex::new(0.0, 0.0)
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        match decode_complex(dec, tag, "Complex<f32>") {
            Some(Some(c)) => *self = Complex::new(c.re as f32, c.im as f32),
            Some(None) => {}
            None => dec.default_decode(self, tag),
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        Some(Complex::new(index as f32, 0.0))
    }

    fn from_value(value: &Value) -> Option<Self> {
        complex_from_value(value).map(|c| Complex::new(c.re as f32, c.im as f32))
    }

    fn to_value(&self) -> Value {
        Value::Complex(Complex::new(f64::from(self.re), f64::from(self.im)))
    }
}
