// ABOUTME: Defines the hprose wire tags and structural marks.
// ABOUTME: Every value on the wire starts with one of these bytes.

/// Tag bytes for hprose values.
/// These match the hprose wire format exactly.
pub mod tag {
    // Serialize tags
    pub const INTEGER: u8 = b'i';
    pub const LONG: u8 = b'l';
    pub const DOUBLE: u8 = b'd';
    pub const NULL: u8 = b'n';
    pub const EMPTY: u8 = b'e';
    pub const TRUE: u8 = b't';
    pub const FALSE: u8 = b'f';
    pub const NAN: u8 = b'N';
    pub const INFINITY: u8 = b'I';
    pub const DATE: u8 = b'D';
    pub const TIME: u8 = b'T';
    pub const UTC: u8 = b'Z';
    pub const BYTES: u8 = b'b';
    pub const UTF8_CHAR: u8 = b'u';
    pub const STRING: u8 = b's';
    pub const GUID: u8 = b'g';
    pub const LIST: u8 = b'a';
    pub const MAP: u8 = b'm';
    pub const CLASS: u8 = b'c';
    pub const OBJECT: u8 = b'o';
    pub const REF: u8 = b'r';

    // Serialize marks
    pub const POS: u8 = b'+';
    pub const NEG: u8 = b'-';
    pub const SEMICOLON: u8 = b';';
    pub const OPENBRACE: u8 = b'{';
    pub const CLOSEBRACE: u8 = b'}';
    pub const QUOTE: u8 = b'"';
    pub const POINT: u8 = b'.';

    // Protocol tags
    pub const HEADER: u8 = b'H';
    pub const CALL: u8 = b'C';
    pub const RESULT: u8 = b'R';
    pub const ERROR: u8 = b'E';
    pub const END: u8 = b'z';

    /// Sentinel returned by [`digit_value`] for non-digit bytes.
    pub const INVALID_DIGIT: u8 = 0xff;

    /// Check if a tag is a single-digit integer shortcut ('0'..='9').
    #[inline]
    pub const fn is_digit(tag: u8) -> bool {
        tag.is_ascii_digit()
    }

    /// Value of an ASCII digit, or [`INVALID_DIGIT`].
    #[inline]
    pub const fn digit_value(b: u8) -> u8 {
        if b.is_ascii_digit() {
            b - b'0'
        } else {
            INVALID_DIGIT
        }
    }

    /// Check if a byte starts a value in the serialize grammar.
    pub const fn is_value_tag(tag: u8) -> bool {
        matches!(
            tag,
            b'0'..=b'9'
                | INTEGER
                | LONG
                | DOUBLE
                | NULL
                | EMPTY
                | TRUE
                | FALSE
                | NAN
                | INFINITY
                | DATE
                | TIME
                | BYTES
                | UTF8_CHAR
                | STRING
                | GUID
                | LIST
                | MAP
                | CLASS
                | OBJECT
                | REF
                | ERROR
        )
    }
}
