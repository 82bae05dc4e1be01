// ABOUTME: String and char destination decoding.
// ABOUTME: Scalars render to their wire text; numbers keep the exact digits sent.

use crate::decode::{Decode, Kind};
use crate::decoder::Decoder;
use crate::error::Error;
use crate::float::read_infinity;
use crate::tags::tag;
use crate::value::Value;

/// Text form of a dynamic scalar, used when a back-reference lands in a string.
fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Int(n) => Some(n.to_string()),
        Value::UInt(n) => Some(n.to_string()),
        Value::Float(f) => Some(format_float(*f)),
        Value::Float32(f) => Some(format_float(f64::from(*f))),
        Value::BigInt(n) => Some(n.to_string()),
        Value::BigFloat(d) => Some(d.to_string()),
        Value::BigRational(r) => Some(r.to_string()),
        Value::Complex(c) => Some(c.to_string()),
        Value::Uuid(u) => Some(u.to_string()),
        Value::DateTime(t) => Some(t.to_rfc3339()),
        Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
        _ => None,
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".into()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "+" } else { "-" };
        format!("{sign}Inf")
    } else {
        f.to_string()
    }
}

impl Decode for String {
    const KIND: Kind = Kind::String;

    fn zero() -> Self {
        String::new()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if tag::is_digit(tag) {
            *self = char::from(tag).to_string();
            return;
        }
        match tag {
            tag::NULL | tag::EMPTY => self.clear(),
            tag::TRUE => *self = "true".into(),
            tag::FALSE => *self = "false".into(),
            tag::NAN => *self = "NaN".into(),
            tag::INFINITY => *self = format_float(read_infinity(dec)),
            tag::INTEGER | tag::LONG | tag::DOUBLE => *self = dec.read_number_text(),
            tag::UTF8_CHAR => *self = dec.read_utf16(1),
            tag::STRING => *self = dec.read_string(),
            tag::BYTES => match String::from_utf8(dec.read_bytes()) {
                Ok(s) => *self = s,
                Err(_) => dec.set_error(Error::InvalidUtf8),
            },
            tag::GUID => *self = dec.read_guid().to_string(),
            tag::DATE | tag::TIME => {
                if let Some(t) = dec.read_temporal(tag) {
                    *self = t.to_rfc3339();
                }
            }
            _ => dec.default_decode(self, tag),
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        Some(index.to_string())
    }

    fn from_value(value: &Value) -> Option<Self> {
        text_from_value(value)
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn type_name() -> String {
        "String".into()
    }
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

impl Decode for char {
    const KIND: Kind = Kind::Char;

    fn zero() -> Self {
        '\0'
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if tag::is_digit(tag) {
            *self = char::from(tag);
            return;
        }
        match tag {
            tag::NULL | tag::EMPTY => *self = '\0',
            tag::UTF8_CHAR | tag::STRING => {
                let text = dec.read_text(tag);
                match single_char(&text) {
                    Some(c) => *self = c,
                    None => dec.parse_error(&text, "char"),
                }
            }
            tag::INTEGER => {
                let n = dec.read_i64();
                match u32::try_from(n).ok().and_then(char::from_u32) {
                    Some(c) => *self = c,
                    None => dec.cast_error("i64", "char"),
                }
            }
            _ => dec.default_decode(self, tag),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some('\0'),
            Value::String(s) => single_char(s),
            Value::Int(n) => u32::try_from(*n).ok().and_then(char::from_u32),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }

    fn type_name() -> String {
        "char".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode<T: Decode>(input: &[u8]) -> (T, Option<Error>) {
        let mut dec = Decoder::new(input);
        let mut value = T::zero();
        dec.decode(&mut value);
        (value, dec.take_error())
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(decode::<String>(b"7").0, "7");
        assert_eq!(decode::<String>(b"n").0, "");
        assert_eq!(decode::<String>(b"e").0, "");
        assert_eq!(decode::<String>(b"t").0, "true");
        assert_eq!(decode::<String>(b"f").0, "false");
        assert_eq!(decode::<String>(b"N").0, "NaN");
        assert_eq!(decode::<String>(b"I+").0, "+Inf");
        assert_eq!(decode::<String>(b"I-").0, "-Inf");
    }

    #[test]
    fn test_numbers_keep_their_digits() {
        assert_eq!(decode::<String>(b"i-0012;").0, "-0012");
        assert_eq!(decode::<String>(b"l123456789012345678901;").0, "123456789012345678901");
        assert_eq!(decode::<String>(b"d1.50;").0, "1.50");
    }

    #[test]
    fn test_text_and_blobs() {
        assert_eq!(decode::<String>("u中".as_bytes()).0, "中");
        assert_eq!(decode::<String>(b"b2\"hi\"").0, "hi");
        let (_, err) = decode::<String>(b"b1\"\xff\"");
        assert_eq!(err, Some(Error::InvalidUtf8));
    }

    #[test]
    fn test_string_reference() {
        let mut dec = Decoder::new(b"s3\"abc\"r0;");
        let first: String = dec.read();
        let second: String = dec.read();
        assert_eq!(first, second);
        assert!(dec.error().is_none());
    }

    #[test]
    fn test_container_is_cast_error() {
        let (_, err) = decode::<String>(b"a1{1}");
        assert_eq!(err, Some(Error::cast("Vec<Value>", "String")));
    }

    #[test]
    fn test_char() {
        assert_eq!(decode::<char>(b"4").0, '4');
        assert_eq!(decode::<char>("ué".as_bytes()).0, 'é');
        assert_eq!(decode::<char>(b"s1\"x\"").0, 'x');
        assert_eq!(decode::<char>(b"i65;").0, 'A');
        let (_, err) = decode::<char>(b"s2\"xy\"");
        assert_eq!(err, Some(Error::parse("xy", "char")));
    }
}
