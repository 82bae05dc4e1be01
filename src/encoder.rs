// ABOUTME: Minimal hprose writer producing the wire format the decoder reads.
// ABOUTME: Tracks the same reference numbering as the decoder so repeated strings become back-references.

use crate::error::{Error, Result};
use crate::tags::tag;
use crate::value::Value;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use num_bigint::BigInt;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use uuid::Uuid;

/// An hprose encoder that writes to a byte sink.
///
/// Container helpers do not check balance; callers pair every `begin_*`
/// with [`end`](Self::end).
pub struct Encoder<W: Write> {
    writer: W,
    simple: bool,
    /// Number of values the decoder will have registered so far.
    refs: usize,
    strings: HashMap<String, usize>,
    classes: usize,
    /// Storage address and reference index of each container `write_value` is inside.
    open: Vec<(usize, usize)>,
}

impl<W: Write> Encoder<W> {
    /// Create a new encoder that writes to the given writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            simple: false,
            refs: 0,
            strings: HashMap::new(),
            classes: 0,
            open: Vec::new(),
        }
    }

    /// Create an encoder that never emits back-references.
    pub fn simple(writer: W) -> Self {
        Self {
            simple: true,
            ..Self::new(writer)
        }
    }

    /// Consume the encoder and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Forget every registered value and class.
    pub fn reset(&mut self) {
        self.refs = 0;
        self.strings.clear();
        self.classes = 0;
    }

    #[inline]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.writer.write_all(&[byte])?;
        Ok(())
    }

    #[inline]
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// `tag` followed by `n` and a `;`.
    fn write_number(&mut self, tag: u8, n: impl std::fmt::Display) -> Result<()> {
        self.write_byte(tag)?;
        write!(self.writer, "{n};")?;
        Ok(())
    }

    /// A count prefix followed by `open`; zero counts are omitted.
    fn write_count(&mut self, count: usize, open: u8) -> Result<()> {
        if count > 0 {
            write!(self.writer, "{count}")?;
        }
        self.write_byte(open)
    }

    /// Register one value and return its index.
    fn register(&mut self) -> usize {
        let index = self.refs;
        if !self.simple {
            self.refs += 1;
        }
        index
    }

    /// Number of values registered so far.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.refs
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.write_byte(tag::NULL)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_byte(if value { tag::TRUE } else { tag::FALSE })
    }

    /// Encode a signed integer, using the digit shortcut for 0 through 9.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        match value {
            0..=9 => self.write_byte(b'0' + value as u8),
            v if i32::try_from(v).is_ok() => self.write_number(tag::INTEGER, v),
            v => self.write_number(tag::LONG, v),
        }
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        match i64::try_from(value) {
            Ok(v) => self.write_i64(v),
            Err(_) => self.write_number(tag::LONG, value),
        }
    }

    /// Encode a float; NaN and infinities use their own tags.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        if value.is_nan() {
            self.write_byte(tag::NAN)
        } else if value.is_infinite() {
            self.write_byte(tag::INFINITY)?;
            self.write_byte(if value > 0.0 { tag::POS } else { tag::NEG })
        } else {
            self.write_number(tag::DOUBLE, value)
        }
    }

    pub fn write_big_int(&mut self, value: &BigInt) -> Result<()> {
        self.write_number(tag::LONG, value)
    }

    pub fn write_big_decimal(&mut self, value: &BigDecimal) -> Result<()> {
        self.write_number(tag::DOUBLE, value)
    }

    /// Encode a string. Repeats become back-references unless the encoder is simple.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let units = value.encode_utf16().count();
        if units == 0 {
            return self.write_byte(tag::EMPTY);
        }
        if units == 1 {
            self.write_byte(tag::UTF8_CHAR)?;
            return self.write_raw(value.as_bytes());
        }
        if let Some(&index) = self.strings.get(value) {
            return self.write_ref(index);
        }
        let index = self.register();
        if !self.simple {
            self.strings.insert(value.to_string(), index);
        }
        self.write_byte(tag::STRING)?;
        self.write_count(units, tag::QUOTE)?;
        self.write_raw(value.as_bytes())?;
        self.write_byte(tag::QUOTE)
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.register();
        self.write_byte(tag::BYTES)?;
        self.write_count(value.len(), tag::QUOTE)?;
        self.write_raw(value)?;
        self.write_byte(tag::QUOTE)
    }

    pub fn write_guid(&mut self, value: &Uuid) -> Result<()> {
        self.register();
        self.write_byte(tag::GUID)?;
        write!(self.writer, "{{{}}}", value.hyphenated())?;
        Ok(())
    }

    /// Encode a date-time in UTC, dropping the clock part at midnight.
    pub fn write_datetime(&mut self, value: &DateTime<FixedOffset>) -> Result<()> {
        self.register();
        let t = value.with_timezone(&Utc);
        write!(self.writer, "D{}", t.format("%Y%m%d"))?;
        if t.num_seconds_from_midnight() != 0 || t.nanosecond() != 0 {
            write!(self.writer, "T{}", t.format("%H%M%S"))?;
            match t.nanosecond() {
                0 => {}
                n if n % 1_000_000 == 0 => write!(self.writer, ".{:03}", n / 1_000_000)?,
                n if n % 1_000 == 0 => write!(self.writer, ".{:06}", n / 1_000)?,
                n => write!(self.writer, ".{n:09}")?,
            }
        }
        self.write_byte(tag::UTC)
    }

    pub fn write_ref(&mut self, index: usize) -> Result<()> {
        self.write_number(tag::REF, index)
    }

    /// Open a list of `count` elements. Returns its reference index.
    pub fn begin_list(&mut self, count: usize) -> Result<usize> {
        let index = self.register();
        self.write_byte(tag::LIST)?;
        self.write_count(count, tag::OPENBRACE)?;
        Ok(index)
    }

    /// Open a map of `count` key/value pairs. Returns its reference index.
    pub fn begin_map(&mut self, count: usize) -> Result<usize> {
        let index = self.register();
        self.write_byte(tag::MAP)?;
        self.write_count(count, tag::OPENBRACE)?;
        Ok(index)
    }

    /// Declare a class. Returns the index objects use to refer to it.
    pub fn write_class(&mut self, name: &str, fields: &[&str]) -> Result<usize> {
        self.write_byte(tag::CLASS)?;
        write!(self.writer, "{}", name.encode_utf16().count())?;
        self.write_byte(tag::QUOTE)?;
        self.write_raw(name.as_bytes())?;
        self.write_byte(tag::QUOTE)?;
        self.write_count(fields.len(), tag::OPENBRACE)?;
        for field in fields {
            self.write_str(field)?;
        }
        self.write_byte(tag::CLOSEBRACE)?;
        let index = self.classes;
        self.classes += 1;
        Ok(index)
    }

    /// Open an object of a declared class. Returns its reference index.
    pub fn begin_object(&mut self, class: usize) -> Result<usize> {
        let index = self.register();
        self.write_byte(tag::OBJECT)?;
        write!(self.writer, "{class}")?;
        self.write_byte(tag::OPENBRACE)?;
        Ok(index)
    }

    /// Close the innermost list, map or object.
    pub fn end(&mut self) -> Result<()> {
        self.write_byte(tag::CLOSEBRACE)
    }

    /// Encode a dynamic value. Objects are written as string-keyed maps.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write_null(),
            Value::Bool(b) => self.write_bool(*b),
            Value::Int(n) => self.write_i64(*n),
            Value::UInt(n) => self.write_u64(*n),
            Value::Float32(f) => self.write_f64(f64::from(*f)),
            Value::Float(f) => self.write_f64(*f),
            Value::BigInt(n) => self.write_big_int(n),
            Value::BigFloat(d) => self.write_big_decimal(d),
            Value::BigRational(r) => self.write_str(&r.to_string()),
            Value::Complex(c) => self.write_str(&c.to_string()),
            Value::String(s) => self.write_str(s),
            Value::Bytes(b) => self.write_bytes(b),
            Value::Uuid(u) => self.write_guid(u),
            Value::DateTime(t) => self.write_datetime(t),
            Value::List(items) => {
                let index = self.begin_list(items.len())?;
                self.write_members(storage_addr(items), index, |enc| {
                    items.iter().try_for_each(|item| enc.write_value(item))
                })
            }
            Value::Map(pairs) => {
                let index = self.begin_map(pairs.len())?;
                self.write_members(storage_addr(pairs), index, |enc| {
                    pairs.iter().try_for_each(|(k, v)| {
                        enc.write_value(k)?;
                        enc.write_value(v)
                    })
                })
            }
            Value::Object(members) => {
                let index = self.begin_map(members.len())?;
                self.write_members(storage_addr(members), index, |enc| {
                    members.iter().try_for_each(|(k, v)| {
                        enc.write_str(k)?;
                        enc.write_value(v)
                    })
                })
            }
            Value::Cycle(edge) => {
                let addr = edge.addr();
                let target = self.open.iter().rev().find(|(a, _)| *a == addr);
                match target {
                    Some(&(_, index)) if !self.simple => self.write_ref(index),
                    _ => Err(Error::Custom(
                        "back edge has no enclosing container to reference".into(),
                    )),
                }
            }
        }
    }

    /// Write a container's members while it is open for back edges, then close it.
    fn write_members(
        &mut self,
        addr: usize,
        index: usize,
        write: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.open.push((addr, index));
        let written = write(self);
        self.open.pop();
        written?;
        self.end()
    }
}

fn storage_addr<T>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc).cast::<()>() as usize
}

/// Encode a dynamic value to a byte vector.
///
/// # Errors
///
/// Only fails if writing to the buffer fails.
pub fn to_vec(value: &Value) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(Vec::new());
    encoder.write_value(value)?;
    encoder.finish()
}
