// ABOUTME: Byte-blob fast paths for Vec<u8> and [u8; N] destinations.
// ABOUTME: Blob, string and GUID payloads are copied as raw bytes instead of element by element.

use crate::decoder::Decoder;
use crate::tags::tag;
use crate::value::Value;
use std::any::Any;

/// Raw bytes behind a blob-like tag, or `None` when the tag is not one.
pub(crate) fn read_blob(dec: &mut Decoder<'_>, tag: u8) -> Option<Vec<u8>> {
    match tag {
        tag::NULL | tag::EMPTY => Some(Vec::new()),
        tag::BYTES => Some(dec.read_bytes()),
        tag::UTF8_CHAR => Some(dec.read_utf16(1).into_bytes()),
        tag::STRING => Some(dec.read_string().into_bytes()),
        tag::GUID => Some(dec.read_guid().as_bytes().to_vec()),
        _ => None,
    }
}

/// Raw bytes of a referenced blob-like value.
pub(crate) fn blob_from_value(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Bytes(b) => Some(b.clone()),
        Value::String(s) => Some(s.clone().into_bytes()),
        Value::Uuid(u) => Some(u.as_bytes().to_vec()),
        _ => None,
    }
}

/// Decode a blob into `dest` when it is a `Vec<u8>`. Returns false if the tag
/// or the destination is not a blob.
pub(crate) fn decode_byte_vec<T: 'static>(
    dest: &mut Vec<T>,
    dec: &mut Decoder<'_>,
    tag: u8,
) -> bool {
    let Some(bytes) = (dest as &mut dyn Any).downcast_mut::<Vec<u8>>() else {
        return false;
    };
    match read_blob(dec, tag) {
        Some(blob) => {
            *bytes = blob;
            true
        }
        None => false,
    }
}

/// Decode a blob into `dest` when it is a `[u8; N]`, truncating or zero-padding.
pub(crate) fn decode_byte_array<T: 'static, const N: usize>(
    dest: &mut [T; N],
    dec: &mut Decoder<'_>,
    tag: u8,
) -> bool {
    let Some(bytes) = (dest as &mut dyn Any).downcast_mut::<[u8; N]>() else {
        return false;
    };
    match read_blob(dec, tag) {
        Some(blob) => {
            let n = blob.len().min(N);
            bytes[..n].copy_from_slice(&blob[..n]);
            bytes[n..].fill(0);
            true
        }
        None => false,
    }
}

/// The blob form of `src` when it is a `Vec<u8>`.
pub(crate) fn bytes_value<S: Any>(src: &S) -> Option<Value> {
    (src as &dyn Any)
        .downcast_ref::<Vec<u8>>()
        .map(|v| Value::Bytes(v.clone()))
}
