//! The `error` module defines the [`HexViewError`] enum that describes the errors that
//! can occur when laying out, encoding, decoding, editing or hashing hex-text views.
//! Each error carries:
//! 1. When the error occurs, e.g., during line decoding or edit validation.
//! 2. What kind of error was encountered (via [`HexViewErrorKind`]).
//! 3. Context where applicable, e.g., the line number at which decoding failed.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum HexViewError {
    /// Layout or encoder configuration is unusable
    InvalidConfig(HexViewErrorKind),
    /// A hex-text line could not be decoded (1-based line number)
    MalformedLine(HexViewErrorKind, usize),
    /// Edit payload was rejected before touching the line
    EditValidation(HexViewErrorKind),
    /// Digest implementation refused an update
    DigestUpdate(String, Box<dyn Error + Send + Sync>),
    /// Reading or writing a file failed
    Io(PathBuf, io::Error),
}

impl HexViewError {
    /// Returns the kind of the error, if the variant carries one.
    #[must_use]
    pub const fn kind(&self) -> Option<&HexViewErrorKind> {
        match self {
            Self::InvalidConfig(kind) | Self::MalformedLine(kind, _) | Self::EditValidation(kind) => {
                Some(kind)
            }
            Self::DigestUpdate(..) | Self::Io(..) => None,
        }
    }
}

impl fmt::Display for HexViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(base_err) => {
                write!(f, "Invalid hex view configuration: {base_err}")
            }
            Self::MalformedLine(base_err, line) => {
                write!(f, "Malformed hex line #{line}: {base_err}")
            }
            Self::EditValidation(base_err) => {
                write!(f, "Edit rejected: {base_err}")
            }
            Self::DigestUpdate(algorithm, source) => {
                write!(f, "Digest '{algorithm}' failed to update: {source}")
            }
            Self::Io(path, source) => {
                write!(f, "I/O error on '{}': {source}", path.display())
            }
        }
    }
}

impl Error for HexViewError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidConfig(kind) | Self::MalformedLine(kind, _) | Self::EditValidation(kind) => {
                Some(kind)
            }
            Self::DigestUpdate(_, source) => Some(source.as_ref()),
            Self::Io(_, source) => Some(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HexViewErrorKind {
    /// Bits per group is not one of 8, 16, 32, 64, 128
    UnsupportedGroupBits(usize),
    /// Bytes per line is zero
    ZeroBytesPerLine,
    /// Chunk holds more bytes than fit on one line
    ChunkTooLong(usize, usize),
    /// Line does not start with an address followed by ':'
    MissingAddress,
    /// Line has no ' :' divider in front of the ASCII column
    MissingAsciiDivider,
    /// Hex field contains non-hexadecimal characters
    ContainsInvalidCharacters,
    /// Hex field holds an odd number of nibbles
    OddNibbleCount,
    /// Line holds more bytes than the layout allows
    TooManyBytes(usize, usize),
    /// Edit payload size differs from the selection (in hex characters)
    WrongLength { expected: usize, received: usize },
    /// Edit payload contains non-hexadecimal characters
    InvalidCharacters,
    /// Edit targets no bytes
    EmptySelection,
    /// Edit reaches past the end of the line (selection end, bytes in line)
    SelectionOutOfLine(usize, usize),
}

impl fmt::Display for HexViewErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedGroupBits(bits) => {
                write!(f, "Unsupported group size of {bits} bits")
            }
            Self::ZeroBytesPerLine => {
                write!(f, "Bytes per line must be greater than zero")
            }
            Self::ChunkTooLong(max, actual) => {
                write!(f, "Chunk of {actual} bytes exceeds line width of {max} bytes")
            }
            Self::MissingAddress => {
                write!(f, "Line does not start with an address")
            }
            Self::MissingAsciiDivider => {
                write!(f, "Line is missing the ' :' ASCII divider")
            }
            Self::ContainsInvalidCharacters => {
                write!(f, "Hex field contains invalid character(s)")
            }
            Self::OddNibbleCount => {
                write!(f, "Hex field holds an odd number of nibbles")
            }
            Self::TooManyBytes(max, actual) => {
                write!(f, "Line holds {actual} bytes, at most {max} expected")
            }
            Self::WrongLength { expected, received } => {
                write!(
                    f,
                    "Unexpected # of bytes! Expected {expected} hex chars, received {received}"
                )
            }
            Self::InvalidCharacters => {
                write!(f, "Invalid data! Payload must be hex digits or 's:' text")
            }
            Self::EmptySelection => {
                write!(f, "Selection does not cover any byte")
            }
            Self::SelectionOutOfLine(end, len) => {
                write!(f, "Selection ends at byte {end}, line only holds {len}")
            }
        }
    }
}

impl Error for HexViewErrorKind {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_line_number() {
        // Arrange
        let err = HexViewError::MalformedLine(HexViewErrorKind::OddNibbleCount, 7);

        // Act
        let msg = err.to_string();

        // Assert
        assert!(msg.contains("#7"));
        assert!(msg.contains("odd number of nibbles"));
    }

    #[test]
    fn test_source_exposes_kind() {
        // Arrange
        let err = HexViewError::EditValidation(HexViewErrorKind::WrongLength {
            expected: 4,
            received: 3,
        });

        // Act
        let source = err.source().map(ToString::to_string);

        // Assert
        assert_eq!(
            err.kind(),
            Some(&HexViewErrorKind::WrongLength {
                expected: 4,
                received: 3
            })
        );
        assert!(source.is_some_and(|s| s.contains("Expected 4")));
    }
}
