//! The `encoder` module provides [`HexEncoder`], which turns binary chunks into
//! formatted [`Line`]s, and the [`Line`] type shared with the decoder and edit engine.

use crate::error::{HexViewError, HexViewErrorKind};
use crate::layout::{Layout, LayoutConfig};
use std::fmt;

const HEX_LOWER: &[u8; 16] = b"0123456789abcdef";
const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// One rendered line of the hex view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Address of the first byte on the line
    pub address: u64,
    /// Bytes shown on the line (may be shorter than a full line)
    pub bytes: Vec<u8>,
    /// Hex field, including group separators and short-line padding
    pub hex: String,
    /// ASCII gutter, one character per present byte
    pub ascii: String,
    lowercase: bool,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lowercase {
            write!(f, "{:08x}:  {} :{}", self.address, self.hex, self.ascii)
        } else {
            write!(f, "{:08X}:  {} :{}", self.address, self.hex, self.ascii)
        }
    }
}

/// Printable ASCII for bytes in `32..=126`, `.` otherwise.
#[must_use]
pub const fn ascii_char(byte: u8) -> char {
    if matches!(byte, 32..=126) {
        byte as char
    } else {
        '.'
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HexEncoder {
    layout: Layout,
}

impl HexEncoder {
    /// Creates an encoder for the given config.
    ///
    /// # Errors
    /// Returns an error if the config does not describe a valid layout.
    pub fn new(config: &LayoutConfig) -> Result<Self, HexViewError> {
        Ok(Self {
            layout: Layout::new(config)?,
        })
    }

    #[must_use]
    pub const fn from_layout(layout: Layout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Encodes the `line_index`-th chunk of a buffer starting at `base_address`.
    ///
    /// # Errors
    /// Returns an error if `chunk` holds more bytes than one line.
    ///
    /// # Examples
    /// ```
    /// use hexviewlib::{HexEncoder, LayoutConfig};
    ///
    /// let config = LayoutConfig { bits_per_group: 8, bytes_per_line: 8, lowercase_hex: true };
    /// let encoder = HexEncoder::new(&config).unwrap();
    ///
    /// let line = encoder.encode_line(&[0x08, 0x41], 1, 0).unwrap();
    /// assert_eq!(line.to_string(), "00000008:  08 41                    :.A");
    /// ```
    pub fn encode_line(
        &self,
        chunk: &[u8],
        line_index: usize,
        base_address: u64,
    ) -> Result<Line, HexViewError> {
        let offset = (line_index as u64).wrapping_mul(self.layout.bytes_per_line() as u64);
        let address = base_address.wrapping_add(offset);
        self.encode_at(chunk, address)
    }

    /// Encodes a chunk whose first byte sits at `address`.
    ///
    /// # Errors
    /// Returns an error if `chunk` holds more bytes than one line.
    pub fn encode_at(&self, chunk: &[u8], address: u64) -> Result<Line, HexViewError> {
        let max = self.layout.bytes_per_line();
        if chunk.len() > max {
            return Err(HexViewError::InvalidConfig(HexViewErrorKind::ChunkTooLong(
                max,
                chunk.len(),
            )));
        }
        Ok(self.encode_chunk(chunk, address))
    }

    fn encode_chunk(&self, chunk: &[u8], address: u64) -> Line {
        let digits = if self.layout.lowercase_hex() {
            HEX_LOWER
        } else {
            HEX_UPPER
        };
        let group = self.layout.group_size();

        let mut hex = String::with_capacity(self.layout.hex_char_span());
        for index in 0..self.layout.bytes_per_line() {
            if let Some(&byte) = chunk.get(index) {
                hex.push(char::from(digits[usize::from(byte >> 4)]));
                hex.push(char::from(digits[usize::from(byte & 0x0F)]));
            } else {
                hex.push_str("  ");
            }
            if (index + 1) % group == 0 {
                hex.push(' ');
            }
        }

        Line {
            address,
            bytes: chunk.to_vec(),
            hex,
            ascii: chunk.iter().copied().map(ascii_char).collect(),
            lowercase: self.layout.lowercase_hex(),
        }
    }

    /// Lazily encodes `data` line by line.
    pub fn encode_lines<'a>(
        &'a self,
        data: &'a [u8],
        base_address: u64,
    ) -> impl Iterator<Item = Line> + 'a {
        let width = self.layout.bytes_per_line();
        data.chunks(width)
            .enumerate()
            .map(move |(index, chunk)| {
                self.encode_chunk(chunk, base_address.wrapping_add((index * width) as u64))
            })
    }

    /// Renders the whole buffer, lines joined by `'\n'` without a trailing newline.
    #[must_use]
    pub fn render(&self, data: &[u8], base_address: u64) -> String {
        self.encode_lines(data, base_address)
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(bits: usize, bytes: usize, lowercase: bool) -> HexEncoder {
        HexEncoder::new(&LayoutConfig {
            bits_per_group: bits,
            bytes_per_line: bytes,
            lowercase_hex: lowercase,
        })
        .unwrap()
    }

    #[test]
    fn test_encode_ten_bytes_eight_per_line() {
        // Arrange
        let enc = encoder(8, 8, true);
        let data: Vec<u8> = (0x00..=0x09).collect();

        // Act
        let lines: Vec<String> = enc.encode_lines(&data, 0).map(|l| l.to_string()).collect();

        // Assert
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "00000000:  00 01 02 03 04 05 06 07  :........");
        assert_eq!(lines[1], "00000008:  08 09                    :..");
        assert_eq!(lines[0].find(" :").map(|i| i + 2), Some(37));
    }

    #[test]
    fn test_grouped_line_and_case() {
        // Arrange
        let enc = encoder(16, 8, false);
        let data = b"Hi!\x7f\xab\xcd\x00\x20";

        // Act
        let line = enc.encode_line(data, 0, 0xdead_0000).unwrap();

        // Assert
        assert_eq!(line.hex, "4869 217F ABCD 0020 ");
        assert_eq!(line.ascii, "Hi!.... ");
        assert_eq!(line.to_string(), "DEAD0000:  4869 217F ABCD 0020  :Hi!.... ");
    }

    #[test]
    fn test_short_line_keeps_separator_cadence() {
        // Arrange
        let enc = encoder(32, 8, true);

        // Act
        let line = enc.encode_line(&[1, 2, 3, 4, 5], 0, 0).unwrap();

        // Assert
        assert_eq!(line.hex, "01020304 05       ");
        assert_eq!(line.hex.len(), enc.layout().hex_char_span());
        assert_eq!(line.ascii.len(), 5);
    }

    #[test]
    fn test_chunk_too_long() {
        // Arrange
        let enc = encoder(8, 8, true);

        // Act
        let res = enc.encode_line(&[0u8; 9], 0, 0);

        // Assert
        assert!(matches!(
            res,
            Err(HexViewError::InvalidConfig(HexViewErrorKind::ChunkTooLong(8, 9)))
        ));
    }

    #[test]
    fn test_render_has_no_trailing_newline() {
        // Arrange
        let enc = encoder(16, 24, true);
        let data = vec![0xAAu8; 48];

        // Act
        let text = enc.render(&data, 0);

        // Assert
        assert_eq!(text.lines().count(), 2);
        assert!(!text.ends_with('\n'));
        assert!(text.starts_with("00000000:  aaaa"));
        assert!(text.contains("\n00000018:  "));
        assert_eq!(enc.render(&[], 0), "");
    }

    #[test]
    fn test_address_wraps_at_top_of_range() {
        // Arrange
        let enc = encoder(8, 8, true);
        let data: Vec<u8> = (0..12).collect();

        // Act
        let line = enc.encode_line(&[0xaa], 1, u64::MAX - 7).unwrap();
        let text = enc.render(&data, u64::MAX - 7);

        // Assert
        assert_eq!(line.address, 0);
        assert!(text.starts_with("fffffffffffffff8:"));
        assert!(text.lines().nth(1).unwrap().starts_with("00000000:"));
    }

    #[test]
    fn test_ascii_char_boundaries() {
        assert_eq!(ascii_char(31), '.');
        assert_eq!(ascii_char(32), ' ');
        assert_eq!(ascii_char(126), '~');
        assert_eq!(ascii_char(127), '.');
        assert_eq!(ascii_char(0xFF), '.');
    }
}
