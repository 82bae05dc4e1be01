// ABOUTME: Integration tests for the sticky first-error slot and its log output.

use serde_hprose::{decode, Decoder, Error, Value};
use tracing_test::traced_test;

#[test]
fn first_error_wins() {
    let mut dec = Decoder::new(b"s3\"abc\"a1{1}");
    let n: i32 = dec.read();
    assert_eq!(n, 0);
    let _: bool = dec.read();
    assert_eq!(
        dec.error(),
        Some(&Error::Parse {
            text: "abc".into(),
            target: "i32".into()
        })
    );
}

#[test]
fn clear_error_allows_continuing() {
    let mut dec = Decoder::new(b"s1\"x\"5");
    let _: i32 = dec.read();
    assert!(dec.error().is_some());
    dec.clear_error();
    let n: i32 = dec.read();
    assert_eq!(n, 5);
    assert!(dec.error().is_none());
}

#[test]
fn truncated_input_reports_eof() {
    for input in [&b"i12"[..], b"s5\"abc", b"a3{12", b"m1{1", b"g{1234", b"D2024"] {
        let err = decode::<Value>(input).unwrap_err();
        assert!(err.is_eof(), "{:?} gave {err:?}", String::from_utf8_lossy(input));
    }
}

#[test]
fn invalid_tag_is_reported() {
    assert_eq!(decode::<Value>(b"x"), Err(Error::InvalidTag(b'x')));
}

#[test]
fn remote_error_tag() {
    assert_eq!(
        decode::<Value>(b"Es4\"boom\""),
        Err(Error::Remote("boom".into()))
    );
}

#[test]
fn missing_terminator_is_unexpected_tag() {
    let err = decode::<Vec<i32>>(b"a1{12}").unwrap_err();
    assert_eq!(
        err,
        Error::UnexpectedTag {
            expected: b'}',
            found: b'2'
        }
    );
}

#[test]
#[traced_test]
fn first_error_is_logged() {
    let _ = decode::<u16>(b"s2\"zz\"");
    assert!(logs_contain("hprose decode error recorded"));
    assert!(logs_contain("can not parse \"zz\" as u16"));
}
