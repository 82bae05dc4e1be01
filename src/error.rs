// ABOUTME: Error types for hprose decoding.
// ABOUTME: Each variant carries a stable identifier so tests can match on the error kind.

use std::fmt;

/// The result type for hprose operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding an hprose stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The source ran out of bytes before the value was complete.
    Eof,

    /// The pull source reported a failure.
    Io(String),

    /// A well-formed wire value cannot be coerced into the destination type.
    Cast {
        /// Name of the decoded source kind.
        source: String,
        /// Name of the destination type.
        destination: String,
    },

    /// A textual payload does not follow the grammar of its target kind.
    Parse {
        /// The offending text.
        text: String,
        /// Name of the target kind.
        target: String,
    },

    /// A byte that is not a known tag appeared where a tag was expected.
    InvalidTag(u8),

    /// A known tag appeared where a different structural tag was required.
    UnexpectedTag {
        /// The tag the grammar requires at this point.
        expected: u8,
        /// The tag that was read.
        found: u8,
    },

    /// Invalid UTF-8 byte sequence in a string payload.
    InvalidUtf8,

    /// A back-reference was read while reference tracking is disabled.
    ReferenceInSimpleMode,

    /// A back-reference points past the end of the reference table.
    ReferenceOutOfRange {
        /// The index carried by the reference tag.
        index: usize,
        /// Number of registered values.
        len: usize,
    },

    /// A back-reference points at a container that is still being decoded.
    CyclicReference(usize),

    /// An object record names a class schema that was never declared.
    UnknownClass(usize),

    /// The stream carried an error value from the remote peer.
    Remote(String),

    /// Custom error message (for serde integration).
    Custom(String),
}

impl Error {
    /// Returns a stable identifier for the error kind.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Eof => "eof",
            Error::Io(_) => "io_error",
            Error::Cast { .. } => "cast",
            Error::Parse { .. } => "parse",
            Error::InvalidTag(_) => "invalid_tag",
            Error::UnexpectedTag { .. } => "unexpected_tag",
            Error::InvalidUtf8 => "invalid_utf8",
            Error::ReferenceInSimpleMode => "reference_in_simple_mode",
            Error::ReferenceOutOfRange { .. } => "reference_out_of_range",
            Error::CyclicReference(_) => "cyclic_reference",
            Error::UnknownClass(_) => "unknown_class",
            Error::Remote(_) => "remote",
            Error::Custom(_) => "custom",
        }
    }

    /// Returns true if this error means the input ended early.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Eof)
    }

    pub(crate) fn cast(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Error::Cast {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub(crate) fn parse(text: impl Into<String>, target: impl Into<String>) -> Self {
        Error::Parse {
            text: text.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Eof => write!(f, "unexpected end of input"),
            Error::Io(msg) => write!(f, "I/O error: {msg}"),
            Error::Cast {
                source,
                destination,
            } => write!(f, "can not cast {source} to {destination}"),
            Error::Parse { text, target } => write!(f, "can not parse {text:?} as {target}"),
            Error::InvalidTag(tag) => write!(f, "invalid tag: {}", describe_byte(*tag)),
            Error::UnexpectedTag { expected, found } => write!(
                f,
                "expected {}, found {}",
                describe_byte(*expected),
                describe_byte(*found)
            ),
            Error::InvalidUtf8 => write!(f, "invalid UTF-8 sequence"),
            Error::ReferenceInSimpleMode => {
                write!(f, "reference can not be decoded in simple mode")
            }
            Error::ReferenceOutOfRange { index, len } => {
                write!(f, "reference index {index} out of range (table has {len} entries)")
            }
            Error::CyclicReference(index) => {
                write!(f, "reference {index} points at a container still being decoded")
            }
            Error::UnknownClass(index) => write!(f, "object references undeclared class {index}"),
            Error::Remote(msg) => write!(f, "remote error: {msg}"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

fn describe_byte(b: u8) -> String {
    if b.is_ascii_graphic() {
        format!("'{}' (0x{b:02x})", b as char)
    } else {
        format!("0x{b:02x}")
    }
}

impl std::error::Error for Error {}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return Error::Eof;
        }
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
