// ABOUTME: Struct destinations: the Object trait, per-field accessors and the field map.
// ABOUTME: Wire objects and maps are matched to struct fields by name; unknown names are skipped.

use crate::decode::Decode;
use crate::decoder::Decoder;
use crate::tags::tag;
use crate::value::Value;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Decode a wire value into one field of `T`.
pub type DecodeFn<T> = fn(&mut T, &mut Decoder<'_>, u8);
/// Assign a dynamic value to one field of `T`; false when it does not convert.
pub type AssignFn<T> = fn(&mut T, &Value) -> bool;
/// Read one field of `T` as a dynamic value.
pub type ValueFn<T> = fn(&T) -> Value;

/// A struct that decodes from hprose objects.
///
/// Implement it with [`hprose_object!`](crate::hprose_object), which also
/// provides the matching [`Decode`] impl.
pub trait Object: Sized + 'static {
    /// Class name used on the wire.
    fn class_name() -> &'static str;

    /// Every declared field, in declaration order.
    fn fields() -> Vec<Field<Self>>;
}

/// One declared struct field and its accessors.
pub struct Field<T> {
    name: &'static str,
    alias: Option<&'static str>,
    skip: bool,
    decode: DecodeFn<T>,
    assign: AssignFn<T>,
    value: ValueFn<T>,
}

impl<T> Field<T> {
    #[must_use]
    pub fn new(
        name: &'static str,
        decode: DecodeFn<T>,
        assign: AssignFn<T>,
        value: ValueFn<T>,
    ) -> Self {
        Self {
            name,
            alias: None,
            skip: false,
            decode,
            assign,
            value,
        }
    }

    /// Match this field under `alias` instead of its declared name.
    #[must_use]
    pub fn with_alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    /// Exclude this field from decoding.
    #[must_use]
    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The name this field is matched under on the wire.
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        self.alias.unwrap_or(self.name)
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skip
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("skip", &self.skip)
            .finish()
    }
}

/// Wire name to field accessor table for one struct type.
pub struct FieldMap<T> {
    fields: Vec<Field<T>>,
    index: HashMap<&'static str, usize>,
}

impl<T: Object> FieldMap<T> {
    /// Build the map from `T`'s declared fields.
    ///
    /// # Panics
    ///
    /// Panics when two fields share a wire name. This is a declaration bug,
    /// not a data error.
    #[must_use]
    pub fn build() -> Self {
        let fields: Vec<Field<T>> = T::fields().into_iter().filter(|f| !f.skip).collect();
        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            let name = field.wire_name();
            assert!(
                index.insert(name, i).is_none(),
                "ambiguous fields with the same name or alias: {name}"
            );
        }
        Self { fields, index }
    }
}

impl<T> FieldMap<T> {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field<T>> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field<T>> {
        self.fields.iter()
    }
}

/// Decode the value behind the next tag into one named field, or discard it.
///
/// Returns the member's dynamic form while references are tracked.
fn decode_member<T>(
    obj: &mut T,
    fields: &FieldMap<T>,
    name: &str,
    dec: &mut Decoder<'_>,
) -> Option<Value> {
    let tag = dec.next_tag();
    let Some(field) = fields.get(name) else {
        let value = dec.read_value(tag);
        return dec.is_tracking().then_some(value);
    };
    if !dec.is_tracking() {
        (field.decode)(obj, dec, tag);
        return None;
    }
    let start = dec.reference_count();
    (field.decode)(obj, dec, tag);
    Some(
        dec.registered_value(start)
            .unwrap_or_else(|| (field.value)(obj)),
    )
}

/// Record a cast error when the wire class is registered to a type other than `T`.
fn check_class<T: Object + Decode>(dec: &mut Decoder<'_>, class: &str) -> bool {
    match dec.registry().class_type(class) {
        Some(registered) if registered.type_id != TypeId::of::<T>() => {
            dec.cast_error(class, &T::type_name());
            false
        }
        _ => true,
    }
}

/// Decode a wire object, map or null into a struct in place.
pub fn decode_object<T: Object + Decode>(obj: &mut T, dec: &mut Decoder<'_>, tag: u8) {
    match tag {
        tag::NULL | tag::EMPTY => *obj = T::zero(),
        tag::OBJECT => {
            let Some(schema) = dec.read_object_header() else {
                return;
            };
            if !check_class::<T>(dec, schema.name()) {
                return;
            }
            let fields = dec.registry().fields::<T>();
            let slot = dec.reserve_reference();
            let mut members = BTreeMap::new();
            for name in schema.field_names() {
                if dec.error().is_some() {
                    break;
                }
                if let Some(value) = decode_member(obj, &fields, name, dec) {
                    members.insert(name.clone(), value);
                }
            }
            dec.expect(tag::CLOSEBRACE);
            dec.set_reference(slot, || Value::object(members));
        }
        tag::MAP => {
            let count = dec.read_count();
            let fields = dec.registry().fields::<T>();
            let slot = dec.reserve_reference();
            let mut members = BTreeMap::new();
            for _ in 0..count {
                if dec.error().is_some() {
                    break;
                }
                let name: String = dec.read();
                if let Some(value) = decode_member(obj, &fields, &name, dec) {
                    members.insert(name, value);
                }
            }
            dec.expect(tag::CLOSEBRACE);
            dec.set_reference(slot, || Value::object(members));
        }
        _ => dec.default_decode(obj, tag),
    }
}

/// Rebuild a struct from a referenced object or string-keyed map.
#[must_use]
pub fn object_from_value<T: Object + Decode>(value: &Value) -> Option<T> {
    let fields = crate::registry::Registry::global().fields::<T>();
    let assign = |obj: &mut T, name: &str, v: &Value| match fields.get(name) {
        Some(field) => (field.assign)(obj, v),
        None => true,
    };
    let mut obj = T::zero();
    match value {
        Value::Null => {}
        Value::Object(members) => {
            for (name, v) in members.iter() {
                if !assign(&mut obj, name, v) {
                    return None;
                }
            }
        }
        Value::Map(pairs) => {
            for (k, v) in pairs.iter() {
                if !assign(&mut obj, k.as_str()?, v) {
                    return None;
                }
            }
        }
        Value::Cycle(edge) => return object_from_value(&edge.upgrade()?),
        _ => return None,
    }
    Some(obj)
}

/// The dynamic form of a struct: its wire names mapped to field values.
#[must_use]
pub fn object_to_value<T: Object>(obj: &T) -> Value {
    let fields = crate::registry::Registry::global().fields::<T>();
    let members: BTreeMap<String, Value> = fields
        .iter()
        .map(|f| (f.wire_name().to_string(), (f.value)(obj)))
        .collect();
    Value::object(members)
}

/// Implement [`Object`] and [`Decode`] for a struct with a `Default` impl.
///
/// ```
/// use serde_hprose::hprose_object;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct User {
///     name: String,
///     age: i32,
///     cache: Vec<u8>,
/// }
///
/// hprose_object! {
///     User as "User" {
///         name,
///         age => "Age",
///         #[skip] cache,
///     }
/// }
///
/// let user: User = serde_hprose::decode(b"m2{s4\"name\"s3\"Tom\"s3\"Age\"i30;}").unwrap();
/// assert_eq!(user.age, 30);
/// ```
#[macro_export]
macro_rules! hprose_object {
    (
        $ty:ident $(as $class:literal)? {
            $( $(#[$attr:ident])? $field:ident $(=> $alias:literal)? ),* $(,)?
        }
    ) => {
        impl $crate::Object for $ty {
            fn class_name() -> &'static str {
                $crate::__hprose_class_name!($ty $(, $class)?)
            }

            fn fields() -> ::std::vec::Vec<$crate::Field<Self>> {
                ::std::vec![
                    $( $crate::__hprose_field!($ty, $field, [$($alias)?], [$($attr)?]) ),*
                ]
            }
        }

        impl $crate::Decode for $ty {
            const KIND: $crate::Kind = $crate::Kind::Struct;

            fn zero() -> Self {
                <Self as ::std::default::Default>::default()
            }

            fn decode(&mut self, dec: &mut $crate::Decoder<'_>, tag: u8) {
                $crate::object::decode_object(self, dec, tag);
            }

            fn from_value(value: &$crate::Value) -> ::std::option::Option<Self> {
                $crate::object::object_from_value(value)
            }

            fn to_value(&self) -> $crate::Value {
                $crate::object::object_to_value(self)
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __hprose_class_name {
    ($ty:ident) => {
        stringify!($ty)
    };
    ($ty:ident, $class:literal) => {
        $class
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __hprose_field {
    ($ty:ident, $field:ident, [$($alias:literal)?], [$($attr:ident)?]) => {{
        let field = $crate::Field::<$ty>::new(
            stringify!($field),
            |obj: &mut $ty, dec: &mut $crate::Decoder<'_>, tag: u8| {
                $crate::Decode::decode(&mut obj.$field, dec, tag);
            },
            |obj: &mut $ty, value: &$crate::Value| match $crate::Decode::from_value(value) {
                ::std::option::Option::Some(v) => {
                    obj.$field = v;
                    true
                }
                ::std::option::Option::None => false,
            },
            |obj: &$ty| $crate::Decode::to_value(&obj.$field),
        );
        $( let field = field.with_alias($alias); )?
        $( let field = $crate::__hprose_field_attr!(field, $attr); )?
        field
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __hprose_field_attr {
    ($field:expr, skip) => {
        $field.skipped()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::registry::Registry;

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
        label: String,
    }

    hprose_object! {
        Point {
            x,
            y,
            label => "name",
        }
    }

    #[derive(Debug, Default)]
    struct Clash {
        a: i32,
        b: i32,
    }

    hprose_object! {
        Clash {
            a,
            b => "a",
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Hidden {
        shown: i32,
        secret: String,
    }

    hprose_object! {
        Hidden {
            shown,
            #[skip] secret,
        }
    }

    #[test]
    fn test_field_map() {
        let map = FieldMap::<Point>::build();
        assert_eq!(map.len(), 3);
        assert!(map.get("x").is_some());
        assert!(map.get("name").is_some());
        assert!(map.get("label").is_none());
        assert_eq!(Point::class_name(), "Point");
    }

    #[test]
    #[should_panic(expected = "ambiguous fields with the same name or alias: a")]
    fn test_ambiguous_alias_panics() {
        let _ = FieldMap::<Clash>::build();
    }

    #[test]
    fn test_object_in_any_field_order() {
        let mut dec = Decoder::new(b"c5\"Point\"3{s4\"name\"s1\"y\"s1\"x\"}o0{s1\"p\"21}");
        let p: Point = dec.read();
        assert!(dec.error().is_none(), "{:?}", dec.error());
        assert_eq!(
            p,
            Point {
                x: 1,
                y: 2,
                label: "p".into()
            }
        );
    }

    #[test]
    fn test_map_into_struct() {
        let mut dec = Decoder::new(b"m3{s1\"x\"5s5\"extra\"a1{1}s4\"name\"s1\"q\"}");
        let p: Point = dec.read();
        assert!(dec.error().is_none());
        assert_eq!(p.x, 5);
        assert_eq!(p.y, 0);
        assert_eq!(p.label, "q");
    }

    #[test]
    fn test_null_resets_to_default() {
        let mut p = Point {
            x: 9,
            y: 9,
            label: "z".into(),
        };
        let mut dec = Decoder::new(b"n");
        dec.decode(&mut p);
        assert_eq!(p, Point::default());
    }

    #[test]
    fn test_skipped_field_is_not_written() {
        let mut dec = Decoder::new(b"m2{s5\"shown\"1s6\"secret\"s1\"s\"}");
        let h: Hidden = dec.read();
        assert_eq!(h.shown, 1);
        assert_eq!(h.secret, "");
    }

    #[test]
    fn test_object_reference_converts() {
        let mut dec = Decoder::new(b"c5\"Point\"2{s1\"x\"s1\"y\"}o0{34}r2;");
        let first: Point = dec.read();
        let second: Point = dec.read();
        assert!(dec.error().is_none(), "{:?}", dec.error());
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_into_struct_is_cast_error() {
        let mut dec = Decoder::new(b"a0{}");
        let _: Point = dec.read();
        assert_eq!(dec.error(), Some(&Error::cast("Vec<Value>", "Point")));
    }

    #[test]
    fn test_registered_class_must_match_destination() {
        let registry = Registry::new();
        registry.register_as::<Hidden>("legacy.Point");

        let input = b"c12\"legacy.Point\"1{s5\"shown\"}o0{4}";
        let mut dec = Decoder::new(input).with_registry(&registry);
        let h: Hidden = dec.read();
        assert!(dec.error().is_none(), "{:?}", dec.error());
        assert_eq!(h.shown, 4);

        let mut dec = Decoder::new(input).with_registry(&registry);
        let _: Point = dec.read();
        assert_eq!(dec.error(), Some(&Error::cast("legacy.Point", "Point")));
    }

    #[test]
    fn test_unregistered_class_decodes_into_any_struct() {
        let registry = Registry::new();
        let mut dec = Decoder::new(b"c5\"Other\"1{s1\"x\"}o0{8}").with_registry(&registry);
        let p: Point = dec.read();
        assert!(dec.error().is_none());
        assert_eq!(p.x, 8);
    }

    #[test]
    fn test_registered_object_members_are_wire_fields() {
        let mut dec = Decoder::new(b"c5\"Point\"2{s1\"x\"s4\"note\"}o0{3s2\"hi\"}r2;");
        let p: Point = dec.read();
        assert_eq!(p.x, 3);
        let value = dec.decode_value();
        assert!(dec.error().is_none());
        assert_eq!(value.get_key("x"), Some(&Value::Int(3)));
        assert_eq!(value.get_key("note"), Some(&Value::from("hi")));
        assert_eq!(value.get_key("y"), None);
    }

    #[test]
    fn test_truncated_count_stops_at_first_error() {
        let mut dec = Decoder::new(b"m30000000{s1\"x\"1");
        let p: Point = dec.read();
        assert_eq!(p.x, 1);
        assert_eq!(dec.error(), Some(&Error::Eof));
    }

    #[test]
    fn test_private_registry() {
        let registry = Registry::new();
        let mut dec = Decoder::new(b"m1{s1\"y\"7}").with_registry(&registry);
        let p: Point = dec.read();
        assert_eq!(p.y, 7);
        assert_eq!(registry.field_map_count(), 1);
    }
}
