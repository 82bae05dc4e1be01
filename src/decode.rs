// ABOUTME: The destination-side trait every decodable type implements, plus the pointer wrappers.
// ABOUTME: Option, Box, Rc and Arc delegate to the pointee; Rc and Arc keep identity across back-references.

use crate::decoder::Decoder;
use crate::refer::Reference;
use crate::tags::tag;
use crate::value::Value;
use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;

/// Closed set of destination kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Complex64,
    Complex128,
    BigInt,
    BigFloat,
    BigRational,
    Char,
    String,
    Uuid,
    DateTime,
    Array,
    List,
    Map,
    Set,
    Struct,
    Pointer,
    Dynamic,
}

impl Kind {
    /// Kinds a positional list index can be converted into when a list is decoded as a map.
    #[must_use]
    pub fn is_scalar_key(self) -> bool {
        matches!(
            self,
            Kind::I8
                | Kind::I16
                | Kind::I32
                | Kind::I64
                | Kind::Isize
                | Kind::U8
                | Kind::U16
                | Kind::U32
                | Kind::U64
                | Kind::Usize
                | Kind::F32
                | Kind::F64
                | Kind::Complex64
                | Kind::Complex128
                | Kind::String
                | Kind::Dynamic
        )
    }

    /// Returns true for kinds that accept a wire object as a string-keyed map.
    #[must_use]
    pub fn is_string_or_dynamic(self) -> bool {
        matches!(self, Kind::String | Kind::Dynamic)
    }
}

/// A type that can be decoded in place from the hprose wire format.
///
/// `decode` receives the tag byte already read by the caller and writes the
/// result into `self`. Failures are recorded on the decoder and leave `self`
/// unchanged or zeroed.
pub trait Decode: Sized + 'static {
    /// The destination kind, used to choose container fast paths.
    const KIND: Kind;

    /// The zero value written for null and empty wire values.
    fn zero() -> Self;

    /// Decode the value introduced by `tag` into `self`.
    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8);

    /// Convert a positional list index into a map key.
    fn from_index(_index: usize) -> Option<Self> {
        None
    }

    /// Convert a value held in the reference table.
    fn from_value(value: &Value) -> Option<Self>;

    /// The dynamic form stored in the reference table.
    fn to_value(&self) -> Value;

    /// Destination name used in cast errors.
    fn type_name() -> String {
        short_type_name::<Self>()
    }
}

/// `std::any::type_name` with module paths stripped, e.g. `Vec<String>`.
#[must_use]
pub fn short_type_name<T: ?Sized>() -> String {
    fn last_segment(path: &str) -> &str {
        path.rsplit("::").next().unwrap_or(path)
    }

    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut path = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            path.push(c);
        } else {
            out.push_str(last_segment(&path));
            path.clear();
            out.push(c);
        }
    }
    out.push_str(last_segment(&path));
    out
}

// =========================================================================
// Pointer wrappers
// =========================================================================

impl<T: Decode> Decode for Option<T> {
    const KIND: Kind = Kind::Pointer;

    fn zero() -> Self {
        None
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if tag == tag::NULL {
            *self = None;
            return;
        }
        let mut value = T::zero();
        value.decode(dec, tag);
        *self = Some(value);
    }

    fn from_index(index: usize) -> Option<Self> {
        T::from_index(index).map(Some)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_value)
    }
}

impl<T: Decode> Decode for Box<T> {
    const KIND: Kind = Kind::Pointer;

    fn zero() -> Self {
        Box::new(T::zero())
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        (**self).decode(dec, tag);
    }

    fn from_index(index: usize) -> Option<Self> {
        T::from_index(index).map(Box::new)
    }

    fn from_value(value: &Value) -> Option<Self> {
        T::from_value(value).map(Box::new)
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

/// Resolve a back-reference for a shared-handle destination.
///
/// Returns the handle stored by an earlier decode of the same object when
/// `extract` recognizes it, otherwise converts the dynamic form.
fn resolve_shared<P, T: Decode>(
    dec: &mut Decoder<'_>,
    extract: impl Fn(&Rc<dyn Any>) -> Option<P>,
    wrap: impl Fn(T) -> P,
) -> Option<P> {
    let entry = dec.read_reference()?;
    if let Reference::Shared { handle, .. } = &entry {
        if let Some(shared) = extract(handle) {
            return Some(shared);
        }
    }
    let value = entry.value()?;
    match T::from_value(value) {
        Some(v) => Some(wrap(v)),
        None => {
            dec.cast_error(value.kind_name(), &T::type_name());
            None
        }
    }
}

/// Decode a fresh `T` and, when it registered itself, remember the shared handle.
fn decode_shared<P>(
    dec: &mut Decoder<'_>,
    tag: u8,
    build: impl FnOnce(&mut Decoder<'_>, u8) -> P,
    handle: impl FnOnce(&P) -> Rc<dyn Any>,
) -> P {
    let start = dec.reference_count();
    let ptr = build(dec, tag);
    if dec.reference_count() > start {
        dec.share_reference(start, handle(&ptr));
    }
    ptr
}

impl<T: Decode> Decode for Rc<T> {
    const KIND: Kind = Kind::Pointer;

    fn zero() -> Self {
        Rc::new(T::zero())
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if tag == tag::REF {
            if let Some(shared) =
                resolve_shared(dec, |h| Rc::clone(h).downcast::<T>().ok(), Rc::new)
            {
                *self = shared;
            }
            return;
        }
        *self = decode_shared(
            dec,
            tag,
            |dec, tag| {
                let mut value = T::zero();
                value.decode(dec, tag);
                Rc::new(value)
            },
            |rc| Rc::clone(rc) as Rc<dyn Any>,
        );
    }

    fn from_value(value: &Value) -> Option<Self> {
        T::from_value(value).map(Rc::new)
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: Decode> Decode for Arc<T> {
    const KIND: Kind = Kind::Pointer;

    fn zero() -> Self {
        Arc::new(T::zero())
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        if tag == tag::REF {
            if let Some(shared) =
                resolve_shared(dec, |h| h.downcast_ref::<Arc<T>>().cloned(), Arc::new)
            {
                *self = shared;
            }
            return;
        }
        *self = decode_shared(
            dec,
            tag,
            |dec, tag| {
                let mut value = T::zero();
                value.decode(dec, tag);
                Arc::new(value)
            },
            |arc| Rc::new(Arc::clone(arc)) as Rc<dyn Any>,
        );
    }

    fn from_value(value: &Value) -> Option<Self> {
        T::from_value(value).map(Arc::new)
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<String>(), "String");
        assert_eq!(short_type_name::<Vec<Option<i32>>>(), "Vec<Option<i32>>");
        assert_eq!(
            short_type_name::<std::collections::HashMap<String, Value>>(),
            "HashMap<String, Value>"
        );
        assert_eq!(short_type_name::<[u8; 4]>(), "[u8; 4]");
    }

    #[test]
    fn test_scalar_keys() {
        assert!(Kind::I32.is_scalar_key());
        assert!(Kind::String.is_scalar_key());
        assert!(Kind::Dynamic.is_scalar_key());
        assert!(!Kind::Bool.is_scalar_key());
        assert!(!Kind::Struct.is_scalar_key());
    }

    #[test]
    fn test_option_null_is_absent() {
        let mut dest: Option<i32> = Some(5);
        let mut dec = Decoder::new(b"n");
        dec.decode(&mut dest);
        assert_eq!(dest, None);

        let mut dec = Decoder::new(b"i42;");
        dec.decode(&mut dest);
        assert_eq!(dest, Some(42));
    }

    #[test]
    fn test_plain_null_is_zero() {
        let mut dest = 7i32;
        let mut dec = Decoder::new(b"n");
        dec.decode(&mut dest);
        assert_eq!(dest, 0);
        assert!(dec.error().is_none());
    }

    #[test]
    fn test_nested_indirection() {
        let mut dest: Option<Box<Option<u8>>> = None;
        let mut dec = Decoder::new(b"7");
        dec.decode(&mut dest);
        assert_eq!(dest, Some(Box::new(Some(7))));
    }

    #[test]
    fn test_rc_identity_through_references() {
        let mut first: Rc<Vec<i32>> = Rc::default();
        let mut second: Rc<Vec<i32>> = Rc::default();
        let mut dec = Decoder::new(b"a2{12}r0;");
        dec.decode(&mut first);
        dec.decode(&mut second);
        assert!(dec.error().is_none());
        assert_eq!(*first, vec![1, 2]);
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_arc_identity_through_references() {
        let mut first: Arc<String> = Arc::default();
        let mut second: Arc<String> = Arc::default();
        let mut dec = Decoder::new(b"s2\"hi\"r0;");
        dec.decode(&mut first);
        dec.decode(&mut second);
        assert_eq!(first.as_str(), "hi");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_rc_reference_to_other_type_converts() {
        let mut text = String::new();
        let mut number: Rc<i64> = Rc::default();
        let mut dec = Decoder::new(b"s3\"123\"r0;");
        dec.decode(&mut text);
        dec.decode(&mut number);
        assert!(dec.error().is_none());
        assert_eq!(*number, 123);
    }
}
