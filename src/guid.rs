// ABOUTME: UUID destination decoding and the braced GUID wire payload.
// ABOUTME: Accepts the GUID tag, raw 16-byte blobs and textual UUIDs.

use crate::decode::{Decode, Kind};
use crate::decoder::Decoder;
use crate::tags::tag;
use crate::value::Value;
use uuid::Uuid;

/// Byte length of a braced hyphenated UUID, `{` and `}` included.
const GUID_LEN: usize = 38;

fn parse_braced(raw: &[u8]) -> Option<Uuid> {
    let inner = raw.strip_prefix(b"{")?.strip_suffix(b"}")?;
    Uuid::try_parse_ascii(inner).ok()
}

fn uuid_from_bytes(bytes: &[u8]) -> Option<Uuid> {
    if let Ok(raw) = <[u8; 16]>::try_from(bytes) {
        return Some(Uuid::from_bytes(raw));
    }
    Uuid::try_parse_ascii(bytes).ok()
}

impl Decoder<'_> {
    /// Read the payload after a GUID tag and register it.
    pub fn read_guid(&mut self) -> Uuid {
        let raw = self.next(GUID_LEN).to_vec();
        match parse_braced(&raw) {
            Some(u) => {
                self.add_reference(|| Value::Uuid(u));
                u
            }
            None => {
                self.parse_error(&String::from_utf8_lossy(&raw), "Uuid");
                Uuid::nil()
            }
        }
    }
}

impl Decode for Uuid {
    const KIND: Kind = Kind::Uuid;

    fn zero() -> Self {
        Uuid::nil()
    }

    fn decode(&mut self, dec: &mut Decoder<'_>, tag: u8) {
        match tag {
            tag::NULL | tag::EMPTY => *self = Uuid::nil(),
            tag::GUID => *self = dec.read_guid(),
            tag::BYTES => {
                let bytes = dec.read_bytes();
                match uuid_from_bytes(&bytes) {
                    Some(u) => *self = u,
                    None => dec.parse_error(&String::from_utf8_lossy(&bytes), "Uuid"),
                }
            }
            tag::STRING => {
                let text = dec.read_string();
                match Uuid::try_parse(text.trim()) {
                    Ok(u) => *self = u,
                    Err(_) => dec.parse_error(&text, "Uuid"),
                }
            }
            _ => dec.default_decode(self, tag),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Uuid::nil()),
            Value::Uuid(u) => Some(*u),
            Value::String(s) => Uuid::try_parse(s.trim()).ok(),
            Value::Bytes(b) => uuid_from_bytes(b),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }

    fn type_name() -> String {
        "Uuid".into()
    }
}
