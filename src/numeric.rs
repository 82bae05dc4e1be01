// ABOUTME: ASCII digit-run parsers used by nearly every decoder.
// ABOUTME: Unrolls the common short-integer case when the window holds enough bytes.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use crate::error::Error;
use crate::reader::{validate_utf8, ByteReader};
use crate::tags::tag::{self, INVALID_DIGIT};

/// Bytes of lookahead the unrolled path needs in the window.
const UNROLL_WINDOW: usize = 10;

#[inline]
fn digit(b: u8) -> u64 {
    u64::from(tag::digit_value(b))
}

const INVALID: u64 = INVALID_DIGIT as u64;

impl ByteReader<'_> {
    /// Accumulate a run of decimal digits starting with `first`.
    ///
    /// The byte that ends the run is consumed. Overflow wraps.
    pub fn read_uint64_digits(&mut self, first: u8) -> u64 {
        let mut value = digit(first);
        if value == INVALID {
            return 0;
        }
        if self.buffered() >= UNROLL_WINDOW {
            let mut w = [0u8; UNROLL_WINDOW];
            w.copy_from_slice(&self.window()[..UNROLL_WINDOW]);
            for (i, &b) in w[..UNROLL_WINDOW - 1].iter().enumerate() {
                let d = digit(b);
                if d == INVALID {
                    self.advance(i + 1);
                    return value;
                }
                value = value.wrapping_mul(10).wrapping_add(d);
            }
            // Nine digits consumed without a terminator; peek at the tenth.
            if digit(w[UNROLL_WINDOW - 1]) == INVALID {
                self.advance(UNROLL_WINDOW);
                return value;
            }
            self.advance(UNROLL_WINDOW - 1);
        }
        loop {
            let mut consumed = 0;
            let mut terminated = false;
            for &b in self.window() {
                consumed += 1;
                let d = digit(b);
                if d == INVALID {
                    terminated = true;
                    break;
                }
                value = value.wrapping_mul(10).wrapping_add(d);
            }
            self.advance(consumed);
            if terminated || !self.load_more() {
                return value;
            }
        }
    }

    /// Read a signed decimal integer terminated by any non-digit.
    pub fn read_i64(&mut self) -> i64 {
        let c = self.next_byte();
        if c == tag::NEG {
            let first = self.next_byte();
            return (self.read_uint64_digits(first) as i64).wrapping_neg();
        }
        self.read_uint64_digits(c) as i64
    }

    /// Read an unsigned decimal integer. A leading minus sign negates with wrap-around.
    pub fn read_u64(&mut self) -> u64 {
        let c = self.next_byte();
        if c == tag::NEG {
            let first = self.next_byte();
            return self.read_uint64_digits(first).wrapping_neg();
        }
        self.read_uint64_digits(c)
    }

    /// Read a length or count prefix.
    pub fn read_count(&mut self) -> usize {
        let n = self.read_i64();
        if n < 0 {
            self.set_error(Error::parse(n.to_string(), "count"));
            return 0;
        }
        n as usize
    }

    /// Read the text of a numeric payload up to its `;` terminator.
    pub fn read_number_text(&mut self) -> String {
        let raw = self.until(tag::SEMICOLON);
        match validate_utf8(raw) {
            Ok(s) => s.to_owned(),
            Err(err) => {
                self.set_error(err);
                String::new()
            }
        }
    }

    /// Read a `;`-terminated decimal float.
    pub fn read_f64(&mut self) -> f64 {
        let text = self.read_number_text();
        match parse_f64(&text) {
            Some(f) => f,
            None => {
                self.set_error(Error::parse(text, "f64"));
                0.0
            }
        }
    }

    /// Read a `;`-terminated decimal float at single precision.
    pub fn read_f32(&mut self) -> f32 {
        let text = self.read_number_text();
        match parse_f64(&text) {
            Some(f) => f as f32,
            None => {
                self.set_error(Error::parse(text, "f32"));
                0.0
            }
        }
    }
}

/// Locale-independent float parse accepting the spellings peers emit for infinities.
pub(crate) fn parse_f64(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(f) = text.parse::<f64>() {
        return Some(f);
    }
    match text {
        "+Inf" | "+inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" | "-inf" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

/// Boolean text grammar: `1 t T TRUE true True` and `0 f F FALSE false False`.
pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
