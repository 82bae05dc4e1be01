// ABOUTME: hprose deserialization engine for Rust.
// ABOUTME: Decodes tag-prefixed hprose streams into typed destinations, dynamic values or serde types.

//! # hprose
//!
//! A decoder for the hprose serialization format. Every wire value starts with a
//! tag byte; composites, strings and other referencable values are remembered so
//! later `r<index>;` back-references can reuse them.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_hprose::decode;
//!
//! let numbers: Vec<i32> = decode(b"a3{12i300;}").unwrap();
//! assert_eq!(numbers, vec![1, 2, 300]);
//!
//! // Loose coercion: a numeric string decodes into an integer.
//! let n: i64 = decode(b"s3\"123\"").unwrap();
//! assert_eq!(n, 123);
//! ```
//!
//! ## Structs
//!
//! ```rust
//! use serde_hprose::{decode, hprose_object};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! hprose_object! {
//!     Point { x, y }
//! }
//!
//! let p: Point = decode(b"c5\"Point\"2{s1\"x\"s1\"y\"}o0{12}").unwrap();
//! assert_eq!(p, Point { x: 1, y: 2 });
//! ```
//!
//! ## Working with Dynamic Values
//!
//! ```rust
//! use serde_hprose::{decode_value, Value};
//!
//! let value = decode_value(b"m1{s4\"name\"s4\"test\"}").unwrap();
//! assert_eq!(value.get_key("name").and_then(Value::as_str), Some("test"));
//! ```
//!
//! ## Serde
//!
//! Any `DeserializeOwned` type can be decoded with [`from_slice`] or
//! [`from_reader`]; the stream is first decoded dynamically so references
//! are already resolved when serde sees it.

mod big;
mod boolean;
mod bytes;
mod complex;
mod container;
pub mod de;
pub mod decode;
pub mod decoder;
mod dynamic;
pub mod encoder;
pub mod error;
mod float;
mod guid;
mod integer;
mod map;
mod numeric;
pub mod object;
pub mod reader;
pub mod refer;
pub mod registry;
mod string;
pub mod tags;
mod time;
pub mod value;

// Re-export commonly used items at the crate root
pub use de::{from_reader, from_slice, from_slice_with_config, from_value, Deserializer};
pub use decode::{Decode, Kind};
pub use decoder::{ClassSchema, Decoder, DecoderConfig, LongType, MapType, RealType};
pub use encoder::{to_vec, Encoder};
pub use error::{Error, Result};
pub use object::{Field, FieldMap, Object};
pub use registry::Registry;
pub use value::{Cycle, Value};

// The hprose! and hprose_object! macros are exported at crate root via #[macro_export]

use std::io::Read;

fn finish<T>(mut decoder: Decoder<'_>, value: T) -> Result<T> {
    match decoder.take_error() {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

/// Decode one value of type `T` from a byte slice.
///
/// # Errors
///
/// Returns the first error the decode session recorded.
///
/// # Example
///
/// ```rust
/// use serde_hprose::decode;
///
/// let flag: bool = decode(b"s4\"true\"").unwrap();
/// assert!(flag);
/// ```
pub fn decode<T: Decode>(data: &[u8]) -> Result<T> {
    decode_with_config(data, DecoderConfig::default())
}

/// Decode one value of type `T` from a byte slice with custom configuration.
///
/// # Errors
///
/// Returns the first error the decode session recorded.
pub fn decode_with_config<T: Decode>(data: &[u8], config: DecoderConfig) -> Result<T> {
    let mut decoder = Decoder::with_config(data, config);
    let value = decoder.read::<T>();
    finish(decoder, value)
}

/// Decode one value of type `T` pulled from a reader.
///
/// # Errors
///
/// Returns the first error the decode session recorded, including reader failures.
pub fn decode_from_reader<T: Decode, R: Read>(reader: R) -> Result<T> {
    let mut decoder = Decoder::from_reader(reader);
    let value = decoder.read::<T>();
    finish(decoder, value)
}

/// Decode an hprose stream into a dynamic [`Value`].
///
/// # Errors
///
/// Returns the first error the decode session recorded.
///
/// # Example
///
/// ```rust
/// use serde_hprose::{decode_value, Value};
///
/// let value = decode_value(b"a3{123}").unwrap();
/// assert_eq!(value.as_list().map(Vec::len), Some(3));
/// ```
pub fn decode_value(data: &[u8]) -> Result<Value> {
    decode_value_with_config(data, DecoderConfig::default())
}

/// Decode an hprose stream into a dynamic [`Value`] with custom configuration.
///
/// # Errors
///
/// Returns the first error the decode session recorded.
pub fn decode_value_with_config(data: &[u8], config: DecoderConfig) -> Result<Value> {
    let mut decoder = Decoder::with_config(data, config);
    let value = decoder.decode_value();
    finish(decoder, value)
}
