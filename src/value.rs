// ABOUTME: Dynamic value type produced when no static destination type is given.
// ABOUTME: Also the form in which decoded composites are kept in the reference table.

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset};
use num_bigint::BigInt;
use num_complex::Complex64;
use num_rational::BigRational;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// An hprose value of any kind.
///
/// Wire objects and string-keyed maps both land in [`Value::Object`];
/// maps with arbitrary keys keep their pairs in wire order in [`Value::Map`].
///
/// Containers are reference counted, so cloning a value never copies its
/// elements. A container that refers back to itself (or to an enclosing
/// container) holds a [`Value::Cycle`] edge instead of a strong handle.
#[derive(Clone, PartialEq, Default)]
pub enum Value {
    /// Wire null
    #[default]
    Null,
    /// Wire true/false
    Bool(bool),
    /// A signed 64-bit integer
    Int(i64),
    /// An unsigned 64-bit integer
    UInt(u64),
    /// A single-precision float
    Float32(f32),
    /// A double-precision float
    Float(f64),
    /// An arbitrary-precision integer
    BigInt(BigInt),
    /// An arbitrary-precision decimal
    BigFloat(BigDecimal),
    /// An arbitrary-precision rational
    BigRational(BigRational),
    /// A complex number
    Complex(Complex64),
    /// A UTF-8 string
    String(String),
    /// A byte blob
    Bytes(Vec<u8>),
    /// A GUID
    Uuid(Uuid),
    /// A date-time with the offset it was decoded in
    DateTime(DateTime<FixedOffset>),
    /// A list
    List(Rc<Vec<Value>>),
    /// A map with arbitrary keys, in wire order
    Map(Rc<Vec<(Value, Value)>>),
    /// A string-keyed map or a wire object
    Object(Rc<BTreeMap<String, Value>>),
    /// A back-reference to an enclosing container
    Cycle(Cycle),
}

/// Weak edge from inside a container back to the container itself or one of its parents.
#[derive(Clone)]
pub enum Cycle {
    List(Weak<Vec<Value>>),
    Map(Weak<Vec<(Value, Value)>>),
    Object(Weak<BTreeMap<String, Value>>),
}

impl Cycle {
    /// The container this edge points at, while it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Value> {
        match self {
            Cycle::List(w) => w.upgrade().map(Value::List),
            Cycle::Map(w) => w.upgrade().map(Value::Map),
            Cycle::Object(w) => w.upgrade().map(Value::Object),
        }
    }

    /// Address of the container storage, for matching against open containers.
    pub(crate) fn addr(&self) -> usize {
        match self {
            Cycle::List(w) => w.as_ptr().cast::<()>() as usize,
            Cycle::Map(w) => w.as_ptr().cast::<()>() as usize,
            Cycle::Object(w) => w.as_ptr().cast::<()>() as usize,
        }
    }

    /// Returns true when this edge points at the storage of `value`.
    #[must_use]
    pub fn points_to(&self, value: &Value) -> bool {
        match (self, value) {
            (Cycle::List(w), Value::List(rc)) => std::ptr::eq(w.as_ptr(), Rc::as_ptr(rc)),
            (Cycle::Map(w), Value::Map(rc)) => std::ptr::eq(w.as_ptr(), Rc::as_ptr(rc)),
            (Cycle::Object(w), Value::Object(rc)) => std::ptr::eq(w.as_ptr(), Rc::as_ptr(rc)),
            _ => false,
        }
    }
}

impl PartialEq for Cycle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cycle::List(a), Cycle::List(b)) => a.ptr_eq(b),
            (Cycle::Map(a), Cycle::Map(b)) => a.ptr_eq(b),
            (Cycle::Object(a), Cycle::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Cycle::List(_) => "list",
            Cycle::Map(_) => "map",
            Cycle::Object(_) => "object",
        };
        write!(f, "Cycle({kind})")
    }
}

impl Value {
    /// Name of the value's kind, used as the source in cast errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "i64",
            Value::UInt(_) => "u64",
            Value::Float32(_) => "f32",
            Value::Float(_) => "f64",
            Value::BigInt(_) => "BigInt",
            Value::BigFloat(_) => "BigDecimal",
            Value::BigRational(_) => "BigRational",
            Value::Complex(_) => "Complex<f64>",
            Value::String(_) => "String",
            Value::Bytes(_) => "Vec<u8>",
            Value::Uuid(_) => "Uuid",
            Value::DateTime(_) => "DateTime",
            Value::List(_) => "Vec<Value>",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Cycle(_) => "cycle",
        }
    }

    /// A list value.
    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }

    /// A map value with pairs in the given order.
    #[must_use]
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        Value::Map(Rc::new(pairs))
    }

    /// A string-keyed object value.
    #[must_use]
    pub fn object(fields: BTreeMap<String, Value>) -> Self {
        Value::Object(Rc::new(fields))
    }

    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value is any numeric type.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int(_)
                | Value::UInt(_)
                | Value::Float32(_)
                | Value::Float(_)
                | Value::BigInt(_)
                | Value::BigFloat(_)
                | Value::BigRational(_)
        )
    }

    /// If this is a boolean, returns the value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// If this is an integer that fits, returns it as i64.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i64::try_from(*n).ok(),
            Value::BigInt(n) => i64::try_from(n).ok(),
            _ => None,
        }
    }

    /// If this is an integer that fits, returns it as u64.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(n) => Some(*n),
            Value::Int(n) => u64::try_from(*n).ok(),
            Value::BigInt(n) => u64::try_from(n).ok(),
            _ => None,
        }
    }

    /// If this is a number, returns it as f64.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        use num_traits::ToPrimitive;
        match self {
            Value::Float(f) => Some(*f),
            Value::Float32(f) => Some(f64::from(*f)),
            Value::Int(n) => Some(*n as f64),
            Value::UInt(n) => Some(*n as f64),
            Value::BigInt(n) => n.to_f64(),
            Value::BigFloat(n) => n.to_f64(),
            Value::BigRational(n) => n.to_f64(),
            _ => None,
        }
    }

    /// If this is a string, returns a reference to it.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// If this is a byte blob, returns a reference to it.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// If this is a list, returns a reference to it.
    #[must_use]
    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(a) => Some(a),
            _ => None,
        }
    }

    /// If this is an object, returns a reference to it.
    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Index into a list. Returns None if not a list or index out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.as_list().and_then(|a| a.get(index))
    }

    /// Look up a key in an object, or a string key in a map.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(o) => o.get(key),
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::UInt(n) => write!(f, "UInt({n})"),
            Value::Float32(n) => write!(f, "Float32({n})"),
            Value::Float(n) => write!(f, "Float({n})"),
            Value::BigInt(n) => write!(f, "BigInt({n})"),
            Value::BigFloat(n) => write!(f, "BigFloat({n})"),
            Value::BigRational(n) => write!(f, "BigRational({n})"),
            Value::Complex(c) => write!(f, "Complex({c})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Bytes(b) => write!(f, "Bytes({b:?})"),
            Value::Uuid(u) => write!(f, "Uuid({u})"),
            Value::DateTime(t) => write!(f, "DateTime({})", t.to_rfc3339()),
            Value::List(a) => f.debug_tuple("List").field(a).finish(),
            Value::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Value::Object(o) => f.debug_tuple("Object").field(o).finish(),
            Value::Cycle(c) => write!(f, "{c:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::UInt(n) => write!(f, "{n}"),
            Value::Float32(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::BigInt(n) => write!(f, "{n}"),
            Value::BigFloat(n) => write!(f, "{n}"),
            Value::BigRational(n) => write!(f, "{n}"),
            Value::Complex(c) => write!(f, "{c}"),
            Value::String(s) => write!(f, "\"{}\"", s.escape_default()),
            Value::Bytes(b) => write!(f, "b{b:?}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
            Value::List(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Object(o) => {
                write!(f, "{{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", k.escape_default(), v)?;
                }
                write!(f, "}}")
            }
            Value::Cycle(_) => write!(f, "<cycle>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! value_from_small_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Int(i64::from(n))
            }
        }
    )*};
}

value_from_small_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::UInt(n),
        }
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float32(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigInt(n)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::list(iter.into_iter().map(Into::into).collect())
    }
}

/// Macro for building dynamic values.
///
/// # Examples
///
/// ```rust
/// use serde_hprose::hprose;
///
/// let value = hprose!({
///     "name": "test",
///     "values": [1, 2, 3],
///     "active": true
/// });
/// assert_eq!(value.get_key("name").and_then(|v| v.as_str()), Some("test"));
/// ```
#[macro_export]
macro_rules! hprose {
    (null) => {
        $crate::Value::Null
    };

    (true) => {
        $crate::Value::Bool(true)
    };
    (false) => {
        $crate::Value::Bool(false)
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::list(vec![ $( $crate::hprose!($elem) ),* ])
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            let mut map = std::collections::BTreeMap::new();
            $(
                map.insert(String::from($key), $crate::hprose!($value));
            )*
            $crate::Value::object(map)
        }
    };

    ($other:expr) => {
        $crate::Value::from($other)
    };
}
