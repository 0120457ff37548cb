//! The `layout` module provides [`LayoutConfig`] and the validated [`Layout`], the pure
//! column arithmetic shared by the encoder, the selection mapper and the edit engine.
//!
//! A rendered line looks like this (8 bytes per line, 8-bit groups):
//!
//! ```text
//! 00000000:  00 01 02 03 04 05 06 07  :........
//! ^          ^                         ^
//! 0          ADDRESS_OFFSET (11)       line_ascii_offset() (37)
//! ```

use crate::error::{HexViewError, HexViewErrorKind};

/// Width of the `"xxxxxxxx:  "` address prefix in characters.
pub const ADDRESS_OFFSET: usize = 11;
/// Characters between the end of the trimmed hex field and the ASCII column.
pub const ASCII_OFFSET: usize = 3;
/// Group widths accepted by [`Layout::new`], in bits.
pub const VALID_BITS: [usize; 5] = [8, 16, 32, 64, 128];
/// Line widths offered to users, in bytes.
pub const VALID_BYTES: [usize; 10] = [8, 10, 16, 24, 32, 48, 64, 128, 256, 512];

const DEFAULT_BITS: usize = 16;
const DEFAULT_BYTES: usize = 24;

/// Raw, unvalidated layout options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Size of a byte group in bits
    pub bits_per_group: usize,
    /// Number of bytes rendered per line
    pub bytes_per_line: usize,
    /// Render hex digits in lowercase
    pub lowercase_hex: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            bits_per_group: DEFAULT_BITS,
            bytes_per_line: DEFAULT_BYTES,
            lowercase_hex: true,
        }
    }
}

impl LayoutConfig {
    /// Replaces values outside of [`VALID_BITS`] / [`VALID_BYTES`] with the defaults
    /// (16 bits, 24 bytes).
    ///
    /// # Examples
    /// ```
    /// use hexviewlib::LayoutConfig;
    ///
    /// let config = LayoutConfig { bits_per_group: 12, bytes_per_line: 7, lowercase_hex: false };
    /// let config = config.sanitized();
    /// assert_eq!(config.bits_per_group, 16);
    /// assert_eq!(config.bytes_per_line, 24);
    /// ```
    #[must_use]
    pub fn sanitized(self) -> Self {
        let bits_per_group = if VALID_BITS.contains(&self.bits_per_group) {
            self.bits_per_group
        } else {
            log::warn!(
                "Unsupported group size of {} bits, falling back to {DEFAULT_BITS}",
                self.bits_per_group
            );
            DEFAULT_BITS
        };
        let bytes_per_line = if VALID_BYTES.contains(&self.bytes_per_line) {
            self.bytes_per_line
        } else {
            log::warn!(
                "Unsupported line width of {} bytes, falling back to {DEFAULT_BYTES}",
                self.bytes_per_line
            );
            DEFAULT_BYTES
        };
        Self {
            bits_per_group,
            bytes_per_line,
            lowercase_hex: self.lowercase_hex,
        }
    }
}

/// Classification of a column inside a line's hex field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nibble {
    /// High-order digit of the byte at the given index
    Upper(usize),
    /// Low-order digit of the byte at the given index
    Lower(usize),
    /// Separator, padding of a short line, address or ASCII column
    Gap,
}

/// Position of an address inside the rendered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressLocation {
    /// Zero-based line number
    pub line: usize,
    /// Index of the byte inside the line
    pub byte_index: usize,
    /// Column of the byte's upper nibble
    pub column: usize,
}

/// Validated, immutable layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    group_size: usize,
    bytes_per_line: usize,
    lowercase_hex: bool,
}

impl Layout {
    /// Validates the config and rounds the line width down to a whole number of groups
    /// (never below one group).
    ///
    /// # Errors
    /// - Returns an error if the group size is not one of [`VALID_BITS`]
    /// - Returns an error if bytes per line is zero
    ///
    /// # Examples
    /// ```
    /// use hexviewlib::{Layout, LayoutConfig};
    ///
    /// let config = LayoutConfig { bits_per_group: 32, bytes_per_line: 10, lowercase_hex: true };
    /// let layout = Layout::new(&config).unwrap();
    /// assert_eq!(layout.group_size(), 4);
    /// assert_eq!(layout.bytes_per_line(), 8);
    /// ```
    pub fn new(config: &LayoutConfig) -> Result<Self, HexViewError> {
        if !VALID_BITS.contains(&config.bits_per_group) {
            return Err(HexViewError::InvalidConfig(
                HexViewErrorKind::UnsupportedGroupBits(config.bits_per_group),
            ));
        }
        if config.bytes_per_line == 0 {
            return Err(HexViewError::InvalidConfig(
                HexViewErrorKind::ZeroBytesPerLine,
            ));
        }

        let group_size = config.bits_per_group / 8;
        let mut bytes_per_line = config.bytes_per_line;
        let remainder = bytes_per_line % group_size;
        if remainder == bytes_per_line {
            bytes_per_line = group_size;
        } else if remainder != 0 {
            bytes_per_line -= remainder;
        }

        if bytes_per_line != config.bytes_per_line {
            log::debug!(
                "Line width {} rounded to {bytes_per_line} for {group_size}-byte groups",
                config.bytes_per_line
            );
        }

        Ok(Self {
            group_size,
            bytes_per_line,
            lowercase_hex: config.lowercase_hex,
        })
    }

    /// Bytes per group.
    #[must_use]
    pub const fn group_size(&self) -> usize {
        self.group_size
    }

    #[must_use]
    pub const fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    #[must_use]
    pub const fn lowercase_hex(&self) -> bool {
        self.lowercase_hex
    }

    #[must_use]
    pub const fn groups_per_line(&self) -> usize {
        self.bytes_per_line.div_ceil(self.group_size)
    }

    /// Full width of the hex field, including the separator after the last group.
    #[must_use]
    pub const fn hex_char_span(&self) -> usize {
        self.bytes_per_line * 2 + self.groups_per_line()
    }

    /// Width of the hex field without its trailing separator. Relative to
    /// [`ADDRESS_OFFSET`] it is the exclusive end of the last hex digit.
    #[must_use]
    pub const fn hex_char_range(&self) -> usize {
        self.hex_char_span() - 1
    }

    /// Absolute column of the upper nibble of byte `index`.
    ///
    /// # Examples
    /// ```
    /// use hexviewlib::{Layout, LayoutConfig};
    ///
    /// let config = LayoutConfig { bits_per_group: 16, bytes_per_line: 8, lowercase_hex: true };
    /// let layout = Layout::new(&config).unwrap();
    /// // "00000000:  0001 0203 ..." -> byte 2 starts after one separator
    /// assert_eq!(layout.column_for_byte_index(2), 16);
    /// ```
    #[must_use]
    pub const fn column_for_byte_index(&self, index: usize) -> usize {
        ADDRESS_OFFSET + 2 * index + index / self.group_size
    }

    /// Number of bytes covered by the columns `start..end` of the hex field, where `start`
    /// is an upper nibble and `end` is either the lower nibble of the last byte or the
    /// column right after it.
    #[must_use]
    pub const fn byte_count_in_range(&self, start: usize, end: usize) -> usize {
        if end <= start {
            return 0;
        }
        let cell = 2 * self.group_size + 1;
        let width = end - start - 1;
        (width / cell) * self.group_size + (width % cell) / 2 + 1
    }

    /// Absolute column of the first ASCII character.
    #[must_use]
    pub const fn line_ascii_offset(&self) -> usize {
        ADDRESS_OFFSET + self.hex_char_range() + ASCII_OFFSET
    }

    #[must_use]
    pub const fn ascii_column_for_byte_index(&self, index: usize) -> usize {
        self.line_ascii_offset() + index
    }

    /// Byte index under an ASCII column, if the column holds one of the line's bytes.
    #[must_use]
    pub const fn byte_index_at_ascii_column(
        &self,
        column: usize,
        bytes_in_line: usize,
    ) -> Option<usize> {
        let offset = self.line_ascii_offset();
        if column < offset || column - offset >= bytes_in_line {
            return None;
        }
        Some(column - offset)
    }

    /// Classifies a column of a line holding `bytes_in_line` bytes.
    #[must_use]
    pub const fn nibble_at(&self, column: usize, bytes_in_line: usize) -> Nibble {
        if column < ADDRESS_OFFSET {
            return Nibble::Gap;
        }
        let cell = 2 * self.group_size + 1;
        let relative = column - ADDRESS_OFFSET;
        let within = relative % cell;
        if within == 2 * self.group_size {
            return Nibble::Gap;
        }
        let index = (relative / cell) * self.group_size + within / 2;
        if index >= bytes_in_line || index >= self.bytes_per_line {
            return Nibble::Gap;
        }
        if within % 2 == 0 {
            Nibble::Upper(index)
        } else {
            Nibble::Lower(index)
        }
    }

    /// Splits a byte offset into `(line, index in line)`.
    #[must_use]
    pub const fn position_of_offset(&self, offset: usize) -> (usize, usize) {
        (offset / self.bytes_per_line, offset % self.bytes_per_line)
    }

    /// Inverse of [`Layout::position_of_offset`].
    #[must_use]
    pub const fn offset_of_position(&self, line: usize, index: usize) -> usize {
        line * self.bytes_per_line + index
    }

    /// Locates `address` in a view whose first byte sits at `starting_address`.
    /// Returns `None` for addresses below the start.
    #[must_use]
    pub fn locate_address(&self, address: u64, starting_address: u64) -> Option<AddressLocation> {
        let wanted = usize::try_from(address.checked_sub(starting_address)?).ok()?;
        let (line, byte_index) = self.position_of_offset(wanted);
        Some(AddressLocation {
            line,
            byte_index,
            column: self.column_for_byte_index(byte_index),
        })
    }
}
