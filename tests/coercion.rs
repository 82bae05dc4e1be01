// ABOUTME: Integration tests for wire-tag to destination coercions.
// ABOUTME: Covers digit shortcuts, boolean truthiness, fixed arrays and round-trips through the encoder.

use chrono::{DateTime, FixedOffset, Utc};
use num_bigint::BigInt;
use serde_hprose::{decode, decode_value, Decode, Encoder, Error, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

fn encode_with(f: impl FnOnce(&mut Encoder<Vec<u8>>)) -> Vec<u8> {
    let mut enc = Encoder::new(Vec::new());
    f(&mut enc);
    enc.finish().unwrap()
}

fn same_for_digits<T: Decode + PartialEq + std::fmt::Debug>() {
    for d in 0..=9u8 {
        let shortcut: T = decode(&[b'0' + d]).unwrap();
        let general: T = decode(format!("i{d};").as_bytes()).unwrap();
        assert_eq!(shortcut, general, "digit {d} into {}", T::type_name());
    }
}

#[test]
fn digit_shortcut_matches_integer_tag() {
    same_for_digits::<i8>();
    same_for_digits::<i16>();
    same_for_digits::<i32>();
    same_for_digits::<i64>();
    same_for_digits::<u8>();
    same_for_digits::<u64>();
    same_for_digits::<usize>();
    same_for_digits::<f32>();
    same_for_digits::<f64>();
    same_for_digits::<bool>();
    same_for_digits::<String>();
    same_for_digits::<BigInt>();
}

#[test]
fn boolean_truthiness_table() {
    let cases: [(&[u8], Option<bool>); 10] = [
        (b"i-1;", Some(true)),
        (b"0", Some(false)),
        (b"d1.0;", Some(true)),
        (b"i123;", Some(true)),
        (b"e", Some(false)),
        (b"u1", Some(true)),
        (b"s3\"123\"", None),
        (b"uT", Some(true)),
        (b"uf", Some(false)),
        (b"s4\"True\"", Some(true)),
    ];
    for (input, expected) in cases {
        let got = decode::<bool>(input);
        match expected {
            Some(b) => assert_eq!(got, Ok(b), "{}", String::from_utf8_lossy(input)),
            None => assert_eq!(got, Err(Error::Parse { text: "123".into(), target: "bool".into() })),
        }
    }
}

#[test]
fn null_is_zero_for_values_and_absent_for_options() {
    assert_eq!(decode::<i32>(b"n"), Ok(0));
    assert_eq!(decode::<Option<i32>>(b"n"), Ok(None));
    assert_eq!(decode::<Option<i32>>(b"5"), Ok(Some(5)));
    assert_eq!(decode::<Option<Option<String>>>(b"n"), Ok(None));
    assert_eq!(decode::<String>(b"n"), Ok(String::new()));
}

#[test]
fn fixed_arrays_pad_and_truncate() {
    assert_eq!(decode::<[i64; 5]>(b"a3{123}"), Ok([1, 2, 3, 0, 0]));

    let bytes = b"a7{1234567}s5\"after\"";
    let mut dec = serde_hprose::Decoder::new(bytes);
    let head: [i64; 5] = dec.read();
    let after: String = dec.read();
    assert_eq!(head, [1, 2, 3, 4, 5]);
    assert_eq!(after, "after");
    assert!(dec.error().is_none());

    assert_eq!(decode::<[u8; 4]>(b"b2\"ab\""), Ok([b'a', b'b', 0, 0]));
    assert_eq!(decode::<[u8; 2]>(b"s4\"wxyz\""), Ok([b'w', b'x']));
}

#[test]
fn round_trip_integers_through_encoder() {
    for n in [0i64, 9, 10, -1, i64::from(i32::MAX), i64::from(i32::MIN), i64::MAX, i64::MIN] {
        let bytes = encode_with(|e| e.write_i64(n).unwrap());
        assert_eq!(decode::<i64>(&bytes), Ok(n));
    }
    let bytes = encode_with(|e| e.write_u64(u64::MAX).unwrap());
    assert_eq!(decode::<u64>(&bytes), Ok(u64::MAX));
}

#[test]
fn round_trip_floats_through_encoder() {
    for f in [0.0f64, -1.5, f64::MAX, f64::MIN_POSITIVE, f64::INFINITY, f64::NEG_INFINITY] {
        let bytes = encode_with(|e| e.write_f64(f).unwrap());
        assert_eq!(decode::<f64>(&bytes), Ok(f));
    }
    let bytes = encode_with(|e| e.write_f64(f64::NAN).unwrap());
    assert!(decode::<f64>(&bytes).unwrap().is_nan());
    assert!(decode::<i32>(&bytes).is_err());
}

#[test]
fn round_trip_strings_and_blobs() {
    for s in ["", "a", "中", "hello", "😀 smile", "mixed 中文 and 😀😀"] {
        let bytes = encode_with(|e| e.write_str(s).unwrap());
        assert_eq!(decode::<String>(&bytes).as_deref(), Ok(s));
    }
    let blob = vec![0u8, 1, 2, 255, b'"'];
    let bytes = encode_with(|e| e.write_bytes(&blob).unwrap());
    assert_eq!(decode::<Vec<u8>>(&bytes), Ok(blob));
}

#[test]
fn round_trip_guid_and_datetime() {
    let id = Uuid::parse_str("8f8b5d1c-2a4e-4f3b-9c61-0d5e2b7a9f10").unwrap();
    let bytes = encode_with(|e| e.write_guid(&id).unwrap());
    assert_eq!(decode::<Uuid>(&bytes), Ok(id));

    let t = DateTime::parse_from_rfc3339("2021-06-30T08:15:42.250+00:00").unwrap();
    let bytes = encode_with(|e| e.write_datetime(&t).unwrap());
    assert_eq!(decode::<DateTime<FixedOffset>>(&bytes), Ok(t));
    assert_eq!(decode::<DateTime<Utc>>(&bytes), Ok(t.with_timezone(&Utc)));
}

#[test]
fn round_trip_containers() {
    let value = serde_hprose::hprose!([[1, 2], ["x", "y", "x"], [true, null]]);
    let bytes = serde_hprose::to_vec(&value).unwrap();
    assert_eq!(decode_value(&bytes), Ok(value));

    let bytes = encode_with(|e| {
        e.begin_map(2).unwrap();
        e.write_str("one").unwrap();
        e.write_i64(1).unwrap();
        e.write_str("two").unwrap();
        e.write_i64(2).unwrap();
        e.end().unwrap();
    });
    let m: HashMap<String, u16> = decode(&bytes).unwrap();
    assert_eq!(m.len(), 2);
    assert_eq!(m["two"], 2);
    let b: BTreeMap<String, Value> = decode(&bytes).unwrap();
    assert_eq!(b["one"], Value::Int(1));
}

#[test]
fn numeric_strings_coerce() {
    assert_eq!(decode::<i32>(b"s4\"-123\""), Ok(-123));
    assert_eq!(decode::<f64>(b"s3\"1.5\""), Ok(1.5));
    assert_eq!(decode::<u8>(b"u7"), Ok(7));
    assert!(decode::<u8>(b"s3\"abc\"").is_err());
}

#[test]
fn unhandled_tag_reports_source_and_destination() {
    let err = decode::<i32>(b"a1{1}").unwrap_err();
    assert_eq!(err, Error::Cast { source: "Vec<Value>".into(), destination: "i32".into() });
}
