// ABOUTME: Arbitrary-precision integer, decimal and rational destinations.
// ABOUTME: Long and double payloads are parsed from their text so no precision is lost.

use crate::decode::{Decode, Kind};
use crate::decoder::Decoder;
use crate::tags::tag;
use crate::value::Value;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{FromPrimitive, Zero};
use std::str::FromStr;

pub(crate) fn parse_big_int(text: &str) -> Option<BigInt> {
    let text = text.trim();
    BigInt::from_str(text.strip_prefix('+').unwrap_or(text)).ok()
}

pub(crate) fn parse_big_decimal(text: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(text.trim()).ok()
}

/// Decimal exponents past this are rejected instead of being expanded into digits.
const MAX_EXPONENT: u64 = 1 << 16;

fn exponent_in_range(d: &BigDecimal) -> bool {
    d.as_bigint_and_exponent().1.unsigned_abs() <= MAX_EXPONENT
}

/// Accepts `n/d` as well as plain decimal text.
pub(crate) fn parse_big_rational(text: &str) -> Option<BigRational> {
    let text = text.trim();
    if text.contains('/') {
        return BigRational::from_str(text).ok();
    }
    parse_big_decimal(text).and_then(|d| decimal_to_rational(&d))
}

fn decimal_to_rational(d: &BigDecimal) -> Option<BigRational> {
    if !exponent_in_range(d) {
        return None;
    }
    let (digits, scale) = d.as_bigint_and_exponent();
    let power = BigInt::from(10u8).pow(u32::try_from(scale.unsigned_abs()).ok()?);
    if scale >= 0 {
        Some(BigRational::new(digits, power))
    } else {
        Some(BigRational::from_integer(digits * power))
    }
}

/// Integer part of a decimal, truncated toward zero.
fn truncate_decimal(d: &BigDecimal) -> Option<BigInt> {
    exponent_in_range(d).then(|| d.with_scale(0).as_bigint_and_exponent().0)
}

/// Read a text payload and parse it, recording a parse error on failure.
fn parse_payload<T>(
    dec: &mut Decoder<'_>,
    text: &str,
    target: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let parsed = parse(text);
    if parsed.is_none() {
        dec.parse_error(text, target);
    }
    parsed
}

impl Decode for BigInt {
    const KIND: Kind = Kind::BigInt;

    fn zero() -> Self {
        <BigInt as Zero>::zero()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if tag::is_digit(tag) {
            *self = BigInt::from(tag::digit_value(tag));
            return;
        }
        let value = match tag {
            tag::NULL | tag::EMPTY | tag::FALSE => Some(<BigInt as Zero>::zero()),
            tag::TRUE => Some(BigInt::from(1)),
            tag::INTEGER => Some(BigInt::from(dec.read_i64())),
            tag::LONG => {
                let text = dec.read_number_text();
                parse_payload(dec, &text, "BigInt", parse_big_int)
            }
            tag::DOUBLE => {
                let text = dec.read_number_text();
                parse_payload(dec, &text, "BigInt", |text| {
                    parse_big_decimal(text).and_then(|d| truncate_decimal(&d))
                })
            }
            tag::UTF8_CHAR | tag::STRING => {
                let text = dec.read_text(tag);
                parse_payload(dec, &text, "BigInt", parse_big_int)
            }
            _ => {
                dec.default_decode(self, tag);
                return;
            }
        };
        if let Some(n) = value {
            *self = n;
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        Some(BigInt::from(index))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(<BigInt as Zero>::zero()),
            Value::Int(n) => Some(BigInt::from(*n)),
            Value::UInt(n) => Some(BigInt::from(*n)),
            Value::BigInt(n) => Some(n.clone()),
            Value::Float(f) => BigInt::from_f64(f.trunc()),
            Value::BigFloat(d) => truncate_decimal(d),
            Value::String(s) => parse_big_int(s),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::BigInt(self.clone())
    }
}

impl Decode for BigDecimal {
    const KIND: Kind = Kind::BigFloat;

    fn zero() -> Self {
        <BigDecimal as Zero>::zero()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if tag::is_digit(tag) {
            *self = BigDecimal::from(tag::digit_value(tag));
            return;
        }
        let value = match tag {
            tag::NULL | tag::EMPTY | tag::FALSE => Some(<BigDecimal as Zero>::zero()),
            tag::TRUE => Some(BigDecimal::from(1)),
            tag::INTEGER => Some(BigDecimal::from(dec.read_i64())),
            tag::LONG | tag::DOUBLE => {
                let text = dec.read_number_text();
                parse_payload(dec, &text, "BigDecimal", parse_big_decimal)
            }
            tag::UTF8_CHAR | tag::STRING => {
                let text = dec.read_text(tag);
                parse_payload(dec, &text, "BigDecimal", parse_big_decimal)
            }
            _ => {
                dec.default_decode(self, tag);
                return;
            }
        };
        if let Some(n) = value {
            *self = n;
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        Some(BigDecimal::from(index as u64))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(<BigDecimal as Zero>::zero()),
            Value::Int(n) => Some(BigDecimal::from(*n)),
            Value::UInt(n) => Some(BigDecimal::from(*n)),
            Value::BigInt(n) => Some(BigDecimal::from(n.clone())),
            Value::Float(f) => BigDecimal::from_f64(*f),
            Value::Float32(f) => BigDecimal::from_f32(*f),
            Value::BigFloat(d) => Some(d.clone()),
            Value::String(s) => parse_big_decimal(s),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::BigFloat(self.clone())
    }
}

impl Decode for BigRational {
    const KIND: Kind = Kind::BigRational;

    fn zero() -> Self {
        <BigRational as Zero>::zero()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if tag::is_digit(tag) {
            *self = BigRational::from_integer(BigInt::from(tag::digit_value(tag)));
            return;
        }
        let value = match tag {
            tag::NULL | tag::EMPTY | tag::FALSE => Some(<BigRational as Zero>::zero()),
            tag::TRUE => Some(BigRational::from_integer(BigInt::from(1))),
            tag::INTEGER => Some(BigRational::from_integer(BigInt::from(dec.read_i64()))),
            tag::LONG | tag::DOUBLE => {
                let text = dec.read_number_text();
                parse_payload(dec, &text, "BigRational", parse_big_rational)
            }
            tag::UTF8_CHAR | tag::STRING => {
                let text = dec.read_text(tag);
                parse_payload(dec, &text, "BigRational", parse_big_rational)
            }
            _ => {
                dec.default_decode(self, tag);
                return;
            }
        };
        if let Some(n) = value {
            *self = n;
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(<BigRational as Zero>::zero()),
            Value::Int(n) => Some(BigRational::from_integer(BigInt::from(*n))),
            Value::UInt(n) => Some(BigRational::from_integer(BigInt::from(*n))),
            Value::BigInt(n) => Some(BigRational::from_integer(n.clone())),
            Value::Float(f) => BigRational::from_float(*f),
            Value::BigFloat(d) => decimal_to_rational(d),
            Value::BigRational(r) => Some(r.clone()),
            Value::String(s) => parse_big_rational(s),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::BigRational(self.clone())
    }

    fn type_name() -> String {
        "BigRational".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn decode<T: Decode>(input: &[u8]) -> (T, Option<Error>) {
        let mut dec = Decoder::new(input);
        let mut value = T::zero();
        dec.decode(&mut value);
        (value, dec.take_error())
    }

    #[test]
    fn test_big_int_long_payload() {
        let (n, err) = decode::<BigInt>(b"l-98765432109876543210987654321;");
        assert!(err.is_none());
        assert_eq!(n.to_string(), "-98765432109876543210987654321");
    }

    #[test]
    fn test_big_int_from_double_truncates() {
        assert_eq!(decode::<BigInt>(b"d-12.9;").0, BigInt::from(-12));
        assert_eq!(decode::<BigInt>(b"d1e3;").0, BigInt::from(1000));
    }

    #[test]
    fn test_big_int_parse_error() {
        let (_, err) = decode::<BigInt>(b"s3\"1.5\"");
        assert_eq!(err, Some(Error::parse("1.5", "BigInt")));
    }

    #[test]
    fn test_big_int_rejects_infinity() {
        let (_, err) = decode::<BigInt>(b"I+");
        assert_eq!(err, Some(Error::cast("f64", "BigInt")));
    }

    #[test]
    fn test_big_decimal() {
        let (d, err) = decode::<BigDecimal>(b"d3.141592653589793238462643383279;");
        assert!(err.is_none());
        assert_eq!(d.to_string(), "3.141592653589793238462643383279");
        assert_eq!(decode::<BigDecimal>(b"7").0, BigDecimal::from(7));
        let (_, err) = decode::<BigDecimal>(b"N");
        assert_eq!(err, Some(Error::cast("f64", "BigDecimal")));
    }

    #[test]
    fn test_huge_exponent_is_a_parse_error() {
        let (n, err) = decode::<BigInt>(b"d1e40000000;");
        assert_eq!(err, Some(Error::parse("1e40000000", "BigInt")));
        assert!(n.is_zero());
        let (_, err) = decode::<BigInt>(b"d1e-40000000;");
        assert_eq!(err, Some(Error::parse("1e-40000000", "BigInt")));
        let (_, err) = decode::<BigRational>(b"d1e40000000;");
        assert_eq!(err, Some(Error::parse("1e40000000", "BigRational")));
        assert_eq!(decode::<BigInt>(b"d1e300;").0, BigInt::from(10u8).pow(300));
    }

    #[test]
    fn test_huge_exponent_from_value() {
        let huge = Value::BigFloat(parse_big_decimal("1e40000000").unwrap());
        assert_eq!(BigInt::from_value(&huge), None);
        assert_eq!(BigRational::from_value(&huge), None);
    }

    #[test]
    fn test_big_rational() {
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        assert_eq!(decode::<BigRational>(b"s3\"1/2\"").0, half);
        assert_eq!(decode::<BigRational>(b"d0.5;").0, half);
        assert_eq!(
            decode::<BigRational>(b"i-4;").0,
            BigRational::from_integer(BigInt::from(-4))
        );
    }
}
