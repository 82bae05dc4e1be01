// ABOUTME: Decode session tying the byte cursor to the reference table and class schemas.
// ABOUTME: Errors are recorded on the session (first wins) instead of being returned per call.

#![allow(clippy::missing_errors_doc)]

use crate::decode::Decode;
use crate::error::Error;
use crate::reader::{validate_utf8, ByteReader};
use crate::refer::{Reference, ReferenceTable};
use crate::registry::Registry;
use crate::tags::tag;
use crate::value::Value;
use std::any::Any;
use std::io::Read;
use std::rc::Rc;
use tracing::debug;

/// Upper bound on slots allocated up front from a wire count.
pub(crate) const PREALLOC_LIMIT: usize = 4096;

/// How a wire long integer decodes into a dynamic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongType {
    /// Signed 64-bit (default)
    #[default]
    Int64,
    /// Unsigned 64-bit
    Uint64,
    /// Arbitrary precision
    BigInt,
}

/// How a wire double, NaN or infinity decodes into a dynamic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RealType {
    /// Single precision
    Float32,
    /// Double precision (default)
    #[default]
    Float64,
    /// Arbitrary precision decimal
    BigFloat,
}

/// How a wire map decodes into a dynamic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapType {
    /// Keys keep their own kind (default)
    #[default]
    Dynamic,
    /// Keys are coerced to strings
    StringKeyed,
}

/// Configuration options for a decode session.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Disable the reference table (default: false)
    pub simple: bool,
    /// Window size for streaming sources (default: 8192, minimum 64)
    pub buffer_size: usize,
    /// Dynamic representation of wire longs (default: Int64)
    pub long_type: LongType,
    /// Dynamic representation of wire reals (default: Float64)
    pub real_type: RealType,
    /// Dynamic representation of wire maps (default: Dynamic)
    pub map_type: MapType,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            simple: false,
            buffer_size: crate::reader::DEFAULT_BUFFER_SIZE,
            long_type: LongType::default(),
            real_type: RealType::default(),
            map_type: MapType::default(),
        }
    }
}

/// A class declared on the wire: its name and field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSchema {
    name: String,
    names: Vec<String>,
}

impl ClassSchema {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn field_names(&self) -> &[String] {
        &self.names
    }
}

/// An hprose decode session.
///
/// A session is owned by one decode call chain at a time. The reference
/// table and class schemas persist across calls until [`reset`](Self::reset).
pub struct Decoder<'a> {
    reader: ByteReader<'a>,
    refs: ReferenceTable,
    classes: Vec<Rc<ClassSchema>>,
    config: DecoderConfig,
    registry: &'a Registry,
}

impl<'a> Decoder<'a> {
    /// Create a session over an in-memory buffer.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, DecoderConfig::default())
    }

    /// Create a session over an in-memory buffer with custom configuration.
    #[must_use]
    pub fn with_config(data: &'a [u8], config: DecoderConfig) -> Self {
        Self::from_parts(ByteReader::from_slice(data), config)
    }

    /// Create a session pulling from a reader.
    #[must_use]
    pub fn from_reader<R: Read + 'a>(reader: R) -> Self {
        Self::from_reader_with_config(reader, DecoderConfig::default())
    }

    /// Create a session pulling from a reader with custom configuration.
    #[must_use]
    pub fn from_reader_with_config<R: Read + 'a>(reader: R, config: DecoderConfig) -> Self {
        Self::from_parts(ByteReader::from_reader(reader, config.buffer_size), config)
    }

    fn from_parts(reader: ByteReader<'a>, config: DecoderConfig) -> Self {
        Self {
            reader,
            refs: ReferenceTable::new(!config.simple),
            classes: Vec::new(),
            config,
            registry: Registry::global(),
        }
    }

    /// Use `registry` for struct field maps instead of the process-wide one.
    #[must_use]
    pub fn with_registry(mut self, registry: &'a Registry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Returns true when reference tracking is disabled.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.config.simple
    }

    /// Toggle reference tracking.
    pub fn set_simple(&mut self, simple: bool) {
        self.config.simple = simple;
        self.refs.set_enabled(!simple);
    }

    /// Clear the reference table and class schemas. The cursor position is kept.
    pub fn reset(&mut self) {
        debug!(
            references = self.refs.len(),
            classes = self.classes.len(),
            "decoder session reset"
        );
        self.refs.reset();
        self.classes.clear();
    }

    /// Point the session at a new in-memory buffer.
    pub fn reset_bytes(&mut self, data: &'a [u8]) {
        debug!(len = data.len(), "decoder re-pointed at buffer");
        self.reader.reset_bytes(data);
    }

    /// Point the session at a new streaming source.
    pub fn reset_reader<R: Read + 'a>(&mut self, reader: R) {
        debug!("decoder re-pointed at reader");
        self.reader.reset_reader(reader);
    }

    // =========================================================================
    // Sticky error
    // =========================================================================

    /// The first error recorded on this session, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.reader.error()
    }

    /// Record an error unless one is already present.
    pub fn set_error(&mut self, err: Error) {
        self.reader.set_error(err);
    }

    /// Remove and return the recorded error.
    pub fn take_error(&mut self) -> Option<Error> {
        self.reader.take_error()
    }

    pub fn clear_error(&mut self) {
        self.reader.take_error();
    }

    pub fn cast_error(&mut self, source: &str, destination: &str) {
        self.set_error(Error::cast(source, destination));
    }

    pub fn parse_error(&mut self, text: &str, target: &str) {
        self.set_error(Error::parse(text, target));
    }

    /// Decode the value behind `tag` generically and report it as not castable to `T`.
    pub fn decode_error<T: Decode>(&mut self, tag: u8) {
        let value = self.read_value(tag);
        self.cast_error(value.kind_name(), &T::type_name());
    }

    /// Fallback shared by every destination for tags it does not handle itself.
    pub fn default_decode<T: Decode>(&mut self, dest: &mut T, tag: u8) {
        match tag {
            tag::REF => self.resolve_reference(dest),
            tag::CLASS => {
                self.read_class();
                let tag = self.next_tag();
                dest.decode(self, tag);
            }
            _ => self.decode_error::<T>(tag),
        }
    }

    // =========================================================================
    // Cursor access
    // =========================================================================

    #[must_use]
    pub fn reader_mut(&mut self) -> &mut ByteReader<'a> {
        &mut self.reader
    }

    #[inline]
    pub fn next_byte(&mut self) -> u8 {
        self.reader.next_byte()
    }

    #[inline]
    pub fn skip(&mut self) {
        self.reader.skip();
    }

    pub fn next(&mut self, n: usize) -> &[u8] {
        self.reader.next(n)
    }

    pub fn until(&mut self, delim: u8) -> &[u8] {
        self.reader.until(delim)
    }

    pub fn remains(&mut self) -> &[u8] {
        self.reader.remains()
    }

    #[inline]
    pub fn read_i64(&mut self) -> i64 {
        self.reader.read_i64()
    }

    #[inline]
    pub fn read_u64(&mut self) -> u64 {
        self.reader.read_u64()
    }

    #[inline]
    pub fn read_count(&mut self) -> usize {
        self.reader.read_count()
    }

    pub fn read_f64(&mut self) -> f64 {
        self.reader.read_f64()
    }

    pub fn read_f32(&mut self) -> f32 {
        self.reader.read_f32()
    }

    /// Raw text of a `;`-terminated numeric payload.
    pub fn read_number_text(&mut self) -> String {
        self.reader.read_number_text()
    }

    /// Consume one byte that must equal `expected`.
    pub fn expect(&mut self, expected: u8) {
        let found = self.next_byte();
        if found != expected {
            self.set_error(Error::UnexpectedTag { expected, found });
        }
    }

    /// Read the next value tag, absorbing any class declarations in front of it.
    pub fn next_tag(&mut self) -> u8 {
        loop {
            let tag = self.next_byte();
            if tag != tag::CLASS {
                return tag;
            }
            self.read_class();
        }
    }

    /// Decode the next value into `dest`.
    pub fn decode<T: Decode>(&mut self, dest: &mut T) {
        let tag = self.next_tag();
        dest.decode(self, tag);
    }

    /// Decode the next value into a fresh `T`.
    pub fn read<T: Decode>(&mut self) -> T {
        let mut value = T::zero();
        self.decode(&mut value);
        value
    }

    /// Decode the next value without a static destination type.
    pub fn decode_value(&mut self) -> Value {
        let tag = self.next_tag();
        self.read_value(tag)
    }

    // =========================================================================
    // Strings and blobs
    // =========================================================================

    /// Read `units` UTF-16 code units worth of UTF-8 text.
    pub fn read_utf16(&mut self, units: usize) -> String {
        let mut remaining = units;
        let mut out: Vec<u8> = Vec::new();
        while remaining > 0 {
            if self.reader.buffered() == 0 && !self.reader.load_more() {
                break;
            }
            let off = match scan_utf16(self.reader.window(), &mut remaining) {
                Ok(off) => off,
                Err(err) => {
                    self.set_error(err);
                    return String::new();
                }
            };
            let available = self.reader.buffered();
            if out.is_empty() && remaining == 0 && off <= available {
                let text = validate_utf8(&self.reader.window()[..off]).map(str::to_owned);
                self.reader.advance(off);
                return match text {
                    Ok(s) => s,
                    Err(err) => {
                        self.set_error(err);
                        String::new()
                    }
                };
            }
            let take = off.min(available);
            out.extend_from_slice(&self.reader.window()[..take]);
            self.reader.advance(take);
            if off > available {
                out.extend_from_slice(self.reader.next(off - available));
            }
        }
        String::from_utf8(out).unwrap_or_else(|_| {
            self.set_error(Error::InvalidUtf8);
            String::new()
        })
    }

    /// Read a `<len>"text"` payload without registering it.
    pub fn read_safe_string(&mut self) -> String {
        let units = self.read_count();
        let s = self.read_utf16(units);
        self.expect(tag::QUOTE);
        s
    }

    /// Read a `<len>"text"` payload and register it in the reference table.
    pub fn read_string(&mut self) -> String {
        let s = self.read_safe_string();
        self.add_reference(|| Value::String(s.clone()));
        s
    }

    /// Read the text behind a UTF8Char or String tag.
    pub fn read_text(&mut self, tag: u8) -> String {
        if tag == tag::UTF8_CHAR {
            self.read_utf16(1)
        } else {
            self.read_string()
        }
    }

    /// Read a `<len>"bytes"` payload and register it in the reference table.
    pub fn read_bytes(&mut self) -> Vec<u8> {
        let len = self.read_count();
        let data = self.reader.next(len).to_vec();
        self.expect(tag::QUOTE);
        self.add_reference(|| Value::Bytes(data.clone()));
        data
    }

    // =========================================================================
    // Class schemas
    // =========================================================================

    /// Read a class declaration following the class tag.
    pub fn read_class(&mut self) {
        let name = self.read_safe_string();
        let count = self.read_count();
        let mut names = Vec::with_capacity(count.min(PREALLOC_LIMIT));
        for _ in 0..count {
            if self.error().is_some() {
                break;
            }
            let tag = self.next_byte();
            let mut field = String::new();
            field.decode(self, tag);
            names.push(field);
        }
        self.expect(tag::CLOSEBRACE);
        debug!(
            class = %name,
            index = self.classes.len(),
            fields = names.len(),
            registered = self.registry.is_registered(&name),
            "class declared"
        );
        self.classes.push(Rc::new(ClassSchema { name, names }));
    }

    /// Look up a declared class by index.
    pub fn class(&mut self, index: usize) -> Option<Rc<ClassSchema>> {
        let schema = self.classes.get(index).cloned();
        if schema.is_none() {
            self.set_error(Error::UnknownClass(index));
        }
        schema
    }

    /// Read the class index that opens an object record, consuming its `{`.
    pub fn read_object_header(&mut self) -> Option<Rc<ClassSchema>> {
        let index = self.read_count();
        self.class(index)
    }

    /// Number of classes declared so far.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    // =========================================================================
    // References
    // =========================================================================

    /// Returns true when values are being registered.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.refs.is_enabled()
    }

    /// Number of registered values.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.refs.len()
    }

    /// Register a fully decoded value. `make` is only called when tracking is on.
    pub fn add_reference(&mut self, make: impl FnOnce() -> Value) {
        if self.refs.is_enabled() {
            self.refs.add(Reference::Value(Rc::new(make())));
        }
    }

    /// Reserve a slot for a container before its elements are decoded.
    pub fn reserve_reference(&mut self) -> Option<usize> {
        self.refs.reserve()
    }

    /// Fill a slot returned by [`reserve_reference`](Self::reserve_reference).
    pub fn set_reference(&mut self, index: Option<usize>, make: impl FnOnce() -> Value) {
        if let Some(index) = index {
            self.refs.set(index, Reference::Value(Rc::new(make())));
        }
    }

    /// Mark a reserved slot as a dynamic container under construction.
    pub fn set_building(&mut self, index: Option<usize>, edge: impl FnOnce() -> Value) {
        if let Some(index) = index {
            self.refs.set(index, Reference::Building(edge()));
        }
    }

    /// Decode the next value into `dest` and return its dynamic form when tracking is on.
    ///
    /// A value that registered itself is taken from the table, which shares
    /// container storage instead of converting `dest` again.
    pub fn decode_tracked<T: Decode>(&mut self, dest: &mut T) -> Option<Value> {
        let tag = self.next_tag();
        if !self.is_tracking() {
            dest.decode(self, tag);
            return None;
        }
        let start = self.refs.len();
        dest.decode(self, tag);
        Some(self.registered_value(start).unwrap_or_else(|| dest.to_value()))
    }

    /// The value registered at `start` by a decode that began there, if any.
    #[must_use]
    pub fn registered_value(&self, start: usize) -> Option<Value> {
        if self.refs.len() <= start {
            return None;
        }
        self.refs.read(start).and_then(Reference::value).cloned()
    }

    /// Attach a shared handle to an already registered value.
    pub fn share_reference(&mut self, index: usize, handle: Rc<dyn Any>) {
        if let Some(Reference::Value(value)) = self.refs.read(index).cloned() {
            self.refs.set(index, Reference::Shared { handle, value });
        }
    }

    /// Read the index following a reference tag and fetch the entry.
    ///
    /// A reference to a container that is still being decoded is a
    /// [`CyclicReference`](Error::CyclicReference) error.
    pub fn read_reference(&mut self) -> Option<Reference> {
        self.lookup_reference(false)
    }

    /// Like [`read_reference`](Self::read_reference), but a dynamic container
    /// under construction is returned as its [`Building`](Reference::Building) entry.
    pub fn read_reference_or_cycle(&mut self) -> Option<Reference> {
        self.lookup_reference(true)
    }

    fn lookup_reference(&mut self, back_edges: bool) -> Option<Reference> {
        let index = self.read_count();
        if !self.refs.is_enabled() {
            self.set_error(Error::ReferenceInSimpleMode);
            return None;
        }
        match self.refs.read(index) {
            None => {
                let len = self.refs.len();
                self.set_error(Error::ReferenceOutOfRange { index, len });
                None
            }
            Some(Reference::Pending) => {
                self.set_error(Error::CyclicReference(index));
                None
            }
            Some(Reference::Building(_)) if !back_edges => {
                self.set_error(Error::CyclicReference(index));
                None
            }
            Some(entry) => Some(entry.clone()),
        }
    }

    /// Resolve a reference tag into `dest` by converting the registered value.
    pub fn resolve_reference<T: Decode>(&mut self, dest: &mut T) {
        let Some(entry) = self.read_reference() else {
            return;
        };
        let Some(value) = entry.value() else {
            return;
        };
        match T::from_value(value) {
            Some(v) => *dest = v,
            None => self.cast_error(value.kind_name(), &T::type_name()),
        }
    }
}

/// Walk UTF-8 lead bytes, counting UTF-16 code units down from `units`.
///
/// Returns the byte length covered. It may exceed `buf.len()` when the last
/// character straddles the end of the window.
fn scan_utf16(buf: &[u8], units: &mut usize) -> Result<usize, Error> {
    let mut off = 0;
    while *units > 0 && off < buf.len() {
        let b = buf[off];
        let (width, count) = match b >> 4 {
            0..=7 => (1, 1),
            12 | 13 => (2, 1),
            14 => (3, 1),
            15 if b & 8 == 0 => (4, 2),
            _ => return Err(Error::InvalidUtf8),
        };
        off += width;
        *units = units.saturating_sub(count);
    }
    Ok(off)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::tests::Trickle;

    #[test]
    fn test_utf16_counted_strings() {
        let mut dec = Decoder::new("s5\"hello\"s2\"中文\"s2\"😀\"s3\"a😀\"".as_bytes());
        for expected in ["hello", "中文", "😀", "a😀"] {
            let mut s = String::new();
            dec.decode(&mut s);
            assert_eq!(s, expected);
        }
        assert!(dec.error().is_none());
    }

    #[test]
    fn test_strings_across_chunk_boundaries() {
        let input = "s5\"aé中😀\"".as_bytes();
        for chunk in 1..=input.len() {
            let mut dec = Decoder::from_reader(Trickle { data: input, chunk });
            let mut s = String::new();
            dec.decode(&mut s);
            assert_eq!(s, "aé中😀", "chunk {chunk}");
            assert!(dec.error().is_none(), "chunk {chunk}");
        }
    }

    #[test]
    fn test_invalid_lead_byte() {
        let mut dec = Decoder::new(b"s1\"\x80\"");
        let mut s = String::from("keep");
        dec.decode(&mut s);
        assert_eq!(dec.error(), Some(&Error::InvalidUtf8));
    }

    #[test]
    fn test_class_then_objects() {
        let mut dec = Decoder::new(b"c4\"User\"2{s4\"name\"s3\"age\"}o0{s3\"Tom\"i30;}");
        let value = dec.decode_value();
        assert!(dec.error().is_none(), "{:?}", dec.error());
        assert_eq!(dec.class_count(), 1);
        assert_eq!(value.get_key("name"), Some(&Value::from("Tom")));
        assert_eq!(value.get_key("age"), Some(&Value::Int(30)));
    }

    #[test]
    fn test_class_field_names_are_registered() {
        // Field names 0 and 1, then the object at index 2.
        let mut dec = Decoder::new(b"c1\"P\"2{s1\"x\"s1\"y\"}o0{12}r0;r2;");
        dec.decode_value();
        assert_eq!(dec.decode_value(), Value::from("x"));
        let obj = dec.decode_value();
        assert_eq!(obj.get_key("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_unknown_class() {
        let mut dec = Decoder::new(b"o3{}");
        dec.decode_value();
        assert_eq!(dec.error(), Some(&Error::UnknownClass(3)));
    }

    #[test]
    fn test_reference_errors() {
        let mut dec = Decoder::new(b"r0;");
        dec.decode_value();
        assert_eq!(
            dec.error(),
            Some(&Error::ReferenceOutOfRange { index: 0, len: 0 })
        );

        let config = DecoderConfig {
            simple: true,
            ..DecoderConfig::default()
        };
        let mut dec = Decoder::with_config(b"s1\"a\"r0;", config);
        assert_eq!(dec.decode_value(), Value::from("a"));
        dec.decode_value();
        assert_eq!(dec.error(), Some(&Error::ReferenceInSimpleMode));
    }

    #[test]
    fn test_self_reference_is_cyclic_for_typed_destinations() {
        let mut dec = Decoder::new(b"a1{r0;}");
        let _: Vec<Vec<String>> = dec.read();
        assert_eq!(dec.error(), Some(&Error::CyclicReference(0)));

        let mut dec = Decoder::new(b"a1{r0;}");
        let value = dec.decode_value();
        assert!(dec.error().is_none());
        assert!(matches!(value.get(0), Some(Value::Cycle(_))));
    }

    #[test]
    fn test_class_field_count_stops_at_first_error() {
        let mut dec = Decoder::new(b"c1\"P\"50000000{s1\"x\"");
        dec.decode_value();
        assert_eq!(dec.error(), Some(&Error::Eof));
    }

    #[test]
    fn test_first_error_wins() {
        let mut dec = Decoder::new(b"xr9;");
        dec.decode_value();
        dec.decode_value();
        assert_eq!(dec.error(), Some(&Error::InvalidTag(b'x')));
        dec.clear_error();
        assert!(dec.error().is_none());
    }

    #[test]
    fn test_reset_clears_tables() {
        let mut dec = Decoder::new(b"s1\"a\"c1\"C\"0{}r0;");
        dec.decode_value();
        assert_eq!(dec.reference_count(), 1);
        dec.reset();
        assert_eq!(dec.reference_count(), 0);
        dec.decode_value();
        assert_eq!(dec.error(), Some(&Error::ReferenceOutOfRange { index: 0, len: 0 }));
    }

    #[test]
    fn test_reset_bytes_reuses_session() {
        let first = b"s1\"a\"".to_vec();
        let second = b"r0;".to_vec();
        let mut dec = Decoder::new(&first);
        dec.decode_value();
        dec.reset_bytes(&second);
        assert_eq!(dec.decode_value(), Value::from("a"));
    }

    #[test]
    fn test_unexpected_terminator() {
        let mut dec = Decoder::new(b"s1\"a!");
        dec.decode_value();
        assert_eq!(
            dec.error(),
            Some(&Error::UnexpectedTag {
                expected: b'"',
                found: b'!'
            })
        );
    }
}
