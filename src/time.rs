// ABOUTME: Date/time payload parsing and date-time destination decoding.
// ABOUTME: Numbers are nanoseconds since the Unix epoch; strings try a fixed list of layouts.

#![allow(clippy::cast_possible_truncation)]

use crate::decode::{Decode, Kind};
use crate::decoder::Decoder;
use crate::error::Error;
use crate::tags::tag;
use crate::value::Value;
use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};

/// Most fraction digits a wire time carries.
const MAX_FRACTION_DIGITS: usize = 9;

pub(crate) fn epoch() -> DateTime<FixedOffset> {
    Utc.timestamp_nanos(0).fixed_offset()
}

fn from_nanos(nanos: i64) -> DateTime<FixedOffset> {
    Utc.timestamp_nanos(nanos).fixed_offset()
}

fn utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&naive).fixed_offset()
}

/// Parse text against the accepted layouts, most specific first.
pub(crate) fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t);
    }
    if let Ok(t) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(t);
    }
    let bare = text.strip_suffix('Z').unwrap_or(text);
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%a %b %e %H:%M:%S %Y"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(bare, layout) {
            return Some(utc(naive));
        }
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(text) {
        return Some(t);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(utc(date.and_time(NaiveTime::MIN)));
    }
    if let Ok(time) = NaiveTime::parse_from_str(bare, "%H:%M:%S%.f") {
        return Some(utc(NaiveDate::default().and_time(time)));
    }
    None
}

impl Decoder<'_> {
    /// Read the payload after a Date or Time tag and register it.
    pub fn read_temporal(&mut self, tag: u8) -> Option<DateTime<FixedOffset>> {
        let date = if tag == tag::DATE {
            let year = self.read_fixed_digits(4)?;
            let month = self.read_fixed_digits(2)?;
            let day = self.read_fixed_digits(2)?;
            let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) else {
                self.parse_error(&format!("{year:04}{month:02}{day:02}"), "DateTime");
                return None;
            };
            date
        } else {
            NaiveDate::default()
        };

        let mut next = if tag == tag::DATE { self.next_byte() } else { tag::TIME };
        let mut time = NaiveTime::MIN;
        if next == tag::TIME {
            time = self.read_clock()?;
            next = self.next_byte();
            if next == tag::POINT {
                let (nanos, terminator) = self.read_fraction();
                time = time.with_nanosecond(nanos).unwrap_or(time);
                next = terminator;
            }
        }

        let naive = date.and_time(time);
        let t = match next {
            tag::UTC => utc(naive),
            tag::SEMICOLON => match Local.from_local_datetime(&naive).earliest() {
                Some(t) => t.fixed_offset(),
                None => {
                    self.parse_error(&naive.to_string(), "DateTime");
                    return None;
                }
            },
            found => {
                self.set_error(Error::UnexpectedTag {
                    expected: tag::UTC,
                    found,
                });
                return None;
            }
        };
        self.add_reference(|| Value::DateTime(t));
        Some(t)
    }

    fn read_fixed_digits(&mut self, n: usize) -> Option<u32> {
        let raw = self.next(n);
        let parsed = (raw.len() == n && raw.iter().all(u8::is_ascii_digit))
            .then(|| raw.iter().fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0')));
        if parsed.is_none() {
            let text = String::from_utf8_lossy(raw).into_owned();
            self.parse_error(&text, "DateTime");
        }
        parsed
    }

    fn read_clock(&mut self) -> Option<NaiveTime> {
        let hour = self.read_fixed_digits(2)?;
        let minute = self.read_fixed_digits(2)?;
        let second = self.read_fixed_digits(2)?;
        let time = NaiveTime::from_hms_opt(hour, minute, second);
        if time.is_none() {
            self.parse_error(&format!("{hour:02}{minute:02}{second:02}"), "DateTime");
        }
        time
    }

    /// Fraction digits after `.`, scaled to nanoseconds, and the byte that ended them.
    fn read_fraction(&mut self) -> (u32, u8) {
        let mut nanos = 0u32;
        let mut digits = 0;
        loop {
            let b = self.next_byte();
            if !b.is_ascii_digit() {
                while digits < MAX_FRACTION_DIGITS {
                    nanos *= 10;
                    digits += 1;
                }
                return (nanos, b);
            }
            if digits < MAX_FRACTION_DIGITS {
                nanos = nanos * 10 + u32::from(b - b'0');
                digits += 1;
            }
        }
    }
}

/// Shared coercion into a date-time; the outer `None` means the tag was not handled.
fn decode_datetime(dec: &mut Decoder<'_>, tag: u8) -> Option<Option<DateTime<FixedOffset>>> {
    if tag::is_digit(tag) {
        return Some(Some(from_nanos(i64::from(tag::digit_value(tag)))));
    }
    let value = match tag {
        tag::NULL | tag::EMPTY | tag::FALSE => Some(epoch()),
        tag::TRUE => Some(from_nanos(1)),
        tag::INTEGER | tag::LONG => Some(from_nanos(dec.read_i64())),
        tag::DOUBLE => Some(from_nanos(dec.read_f64() as i64)),
        tag::DATE | tag::TIME => dec.read_temporal(tag),
        tag::STRING => {
            let text = dec.read_string();
            let parsed = parse_datetime(&text);
            if parsed.is_none() {
                dec.parse_error(&text, "DateTime");
            }
            parsed
        }
        _ => return None,
    };
    Some(value)
}

fn datetime_from_value(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::Null => Some(epoch()),
        Value::DateTime(t) => Some(*t),
        Value::Int(n) => Some(from_nanos(*n)),
        Value::String(s) => parse_datetime(s),
        _ => None,
    }
}

macro_rules! impl_datetime {
    ($($t:ty => $name:literal, $from:expr, $into:expr);* $(;)?) => {$(
        impl Decode for $t {
            const KIND: Kind = Kind::DateTime;

            fn zero() -> Self {
                let from: fn(DateTime<FixedOffset>) -> $t = $from;
                from(epoch())
            }

            fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
                let from: fn(DateTime<FixedOffset>) -> $t = $from;
                match decode_datetime(dec, tag) {
                    Some(Some(t)) => *self = from(t),
                    Some(None) => {}
                    None => dec.default_decode(self, tag),
                }
            }

            fn from_value(value: &Value) -> Option<Self> {
                let from: fn(DateTime<FixedOffset>) -> $t = $from;
                datetime_from_value(value).map(from)
            }

            fn to_value(&self) -> Value {
                let into: fn(&$t) -> DateTime<FixedOffset> = $into;
                Value::DateTime(into(self))
            }

            fn type_name() -> String {
                $name.into()
            }
        }
    )*};
}

impl_datetime! {
    DateTime<FixedOffset> => "DateTime", |t| t, |t| *t;
    DateTime<Utc> => "DateTime<Utc>", |t| t.with_timezone(&Utc), |t| t.fixed_offset();
    NaiveDateTime => "NaiveDateTime", |t| t.naive_local(), |t| utc(*t);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn decode<T: Decode>(input: &[u8]) -> (T, Option<Error>) {
        let mut dec = Decoder::new(input);
        let mut value = T::zero();
        dec.decode(&mut value);
        (value, dec.take_error())
    }

    #[test]
    fn test_date_tag_utc() {
        let (t, err) = decode::<DateTime<Utc>>(b"D20240229T235958.123Z");
        assert!(err.is_none(), "{err:?}");
        assert_eq!((t.year(), t.month(), t.day()), (2024, 2, 29));
        assert_eq!((t.hour(), t.minute(), t.second()), (23, 59, 58));
        assert_eq!(t.nanosecond(), 123_000_000);
    }

    #[test]
    fn test_date_only_and_time_only() {
        let (t, _) = decode::<NaiveDateTime>(b"D19991231Z");
        assert_eq!(t.to_string(), "1999-12-31 00:00:00");
        let (t, _) = decode::<NaiveDateTime>(b"T120000.000001Z");
        assert_eq!(t.to_string(), "1970-01-01 12:00:00.000001");
    }

    #[test]
    fn test_local_terminator() {
        let (t, err) = decode::<NaiveDateTime>(b"D20200101T080000;");
        assert!(err.is_none());
        assert_eq!(t.to_string(), "2020-01-01 08:00:00");
    }

    #[test]
    fn test_numbers_are_nanoseconds() {
        let (t, _) = decode::<DateTime<Utc>>(b"l1500000000000000000;");
        assert_eq!(t.timestamp(), 1_500_000_000);
        assert_eq!(decode::<DateTime<Utc>>(b"3").0.timestamp_subsec_nanos(), 3);
        assert_eq!(decode::<DateTime<Utc>>(b"n").0.timestamp(), 0);
    }

    #[test]
    fn test_string_layouts() {
        for text in [
            "2021-06-01T10:20:30Z",
            "2021-06-01T10:20:30+00:00",
            "2021-06-01 10:20:30",
            "2021-06-01 10:20:30Z",
            "Tue, 1 Jun 2021 10:20:30 +0000",
            "Tue Jun  1 10:20:30 2021",
        ] {
            let t = parse_datetime(text).unwrap_or_else(|| panic!("{text}"));
            assert_eq!(t.timestamp(), 1_622_542_830, "{text}");
        }
        assert_eq!(parse_datetime("2021-06-01").unwrap().timestamp(), 1_622_505_600);
        assert_eq!(parse_datetime("00:01:00").unwrap().timestamp(), 60);
    }

    #[test]
    fn test_bad_string() {
        let (_, err) = decode::<DateTime<FixedOffset>>(b"s5\"later\"");
        assert_eq!(err, Some(Error::parse("later", "DateTime")));
    }

    #[test]
    fn test_date_reference() {
        let mut dec = Decoder::new(b"D20000101Zr0;");
        let first: DateTime<Utc> = dec.read();
        let second: DateTime<Utc> = dec.read();
        assert_eq!(first, second);
        assert!(dec.error().is_none());
    }

    #[test]
    fn test_invalid_calendar_date() {
        let (_, err) = decode::<DateTime<Utc>>(b"D20230230Z");
        assert_eq!(err, Some(Error::parse("20230230", "DateTime")));
    }
}
