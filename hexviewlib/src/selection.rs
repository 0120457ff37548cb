//! The `selection` module provides [`SelectionMapper`], which turns a column range of a
//! rendered line into the bytes it covers and back.
//!
//! Hex selections snap to nibble boundaries: a selection never starts on a lower nibble
//! and never ends between two nibbles of a byte, so every mapped range covers whole bytes.

use crate::layout::{Layout, Nibble};
use std::ops::Range;

/// Bytes covered by a selection, together with the columns they occupy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSelection {
    /// Covered bytes, as indices into the line
    pub bytes: Range<usize>,
    /// Absolute columns from the first upper nibble to after the last lower nibble
    pub hex: Range<usize>,
    /// Absolute ASCII columns of the covered bytes
    pub ascii: Range<usize>,
}

impl ByteSelection {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            bytes: 0..0,
            hex: 0..0,
            ascii: 0..0,
        }
    }

    #[must_use]
    pub const fn byte_count(&self) -> usize {
        self.bytes.end - self.bytes.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.start >= self.bytes.end
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionMapper {
    layout: Layout,
}

impl SelectionMapper {
    #[must_use]
    pub const fn new(layout: Layout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Maps a selection in either field, picking the field from the start column.
    #[must_use]
    pub fn map(&self, columns: Range<usize>, bytes_in_line: usize) -> ByteSelection {
        if columns.start >= self.layout.line_ascii_offset() {
            self.map_ascii(columns, bytes_in_line)
        } else {
            self.map_hex(columns, bytes_in_line)
        }
    }

    /// Maps a selection made in the hex field.
    ///
    /// A selection starting on a lower nibble snaps back onto its upper nibble, one starting
    /// right before an upper nibble snaps forward onto it. Any other start selects nothing.
    /// A zero-width cursor selects the byte it touches, including a cursor sitting on
    /// the separator right after a byte.
    ///
    /// # Examples
    /// ```
    /// use hexviewlib::{Layout, LayoutConfig, SelectionMapper};
    ///
    /// let config = LayoutConfig { bits_per_group: 16, bytes_per_line: 8, lowercase_hex: true };
    /// let mapper = SelectionMapper::new(Layout::new(&config).unwrap());
    ///
    /// // "00000000:  0001 0203 ..." from the lower nibble of byte 1 to the upper of byte 3
    /// let sel = mapper.map_hex(14..18, 8);
    /// assert_eq!(sel.bytes, 1..3);
    /// assert_eq!(sel.hex, 13..18);
    /// ```
    #[must_use]
    pub fn map_hex(&self, columns: Range<usize>, bytes_in_line: usize) -> ByteSelection {
        let layout = &self.layout;

        if columns.end <= columns.start {
            let byte = match layout.nibble_at(columns.start, bytes_in_line) {
                Nibble::Upper(b) | Nibble::Lower(b) => b,
                Nibble::Gap => {
                    if columns.start == 0 {
                        return ByteSelection::empty();
                    }
                    match layout.nibble_at(columns.start - 1, bytes_in_line) {
                        Nibble::Lower(b) => b,
                        Nibble::Upper(_) | Nibble::Gap => return ByteSelection::empty(),
                    }
                }
            };
            return self.from_bytes(byte, byte + 1);
        }

        // The start moves by at most one column onto an upper nibble
        let first = match layout.nibble_at(columns.start, bytes_in_line) {
            Nibble::Upper(b) | Nibble::Lower(b) => b,
            Nibble::Gap => match layout.nibble_at(columns.start + 1, bytes_in_line) {
                Nibble::Upper(b) => b,
                Nibble::Lower(_) | Nibble::Gap => return ByteSelection::empty(),
            },
        };
        let start_column = layout.column_for_byte_index(first);

        // The end settles on the lower nibble of the last byte, at most two columns back
        let end_column = if let Nibble::Lower(_) = layout.nibble_at(columns.end, bytes_in_line) {
            columns.end
        } else if let Nibble::Lower(_) = layout.nibble_at(columns.end - 1, bytes_in_line) {
            columns.end - 1
        } else {
            columns.end.saturating_sub(2)
        };
        let last_lower = layout.column_for_byte_index(layout.bytes_per_line() - 1) + 1;
        if end_column <= start_column || end_column > last_lower {
            return ByteSelection::empty();
        }

        let count = layout.byte_count_in_range(start_column, end_column);
        self.from_bytes(first, (first + count).min(bytes_in_line))
    }

    /// Maps a selection made in the ASCII field, one column per byte.
    #[must_use]
    pub fn map_ascii(&self, columns: Range<usize>, bytes_in_line: usize) -> ByteSelection {
        let offset = self.layout.line_ascii_offset();

        if columns.end <= columns.start {
            return match self.layout.byte_index_at_ascii_column(columns.start, bytes_in_line) {
                Some(b) => self.from_bytes(b, b + 1),
                None => ByteSelection::empty(),
            };
        }

        let start = columns.start.saturating_sub(offset);
        let end = columns.end.saturating_sub(offset).min(bytes_in_line);
        if start >= end {
            return ByteSelection::empty();
        }
        self.from_bytes(start, end)
    }

    /// Builds the selection covering bytes `start..end` of a line.
    #[must_use]
    pub const fn from_bytes(&self, start: usize, end: usize) -> ByteSelection {
        if end <= start {
            return ByteSelection::empty();
        }
        ByteSelection {
            bytes: start..end,
            hex: self.layout.column_for_byte_index(start)
                ..self.layout.column_for_byte_index(end - 1) + 2,
            ascii: self.layout.ascii_column_for_byte_index(start)
                ..self.layout.ascii_column_for_byte_index(end),
        }
    }

    /// Hex column spans of a selection, one per touched group. Separators are not part
    /// of any span.
    #[must_use]
    pub fn hex_regions(&self, selection: &ByteSelection) -> Vec<Range<usize>> {
        let group = self.layout.group_size();
        let mut regions = Vec::new();
        let mut start = selection.bytes.start;
        while start < selection.bytes.end {
            let group_end = (start / group + 1) * group;
            let end = group_end.min(selection.bytes.end);
            regions.push(
                self.layout.column_for_byte_index(start)
                    ..self.layout.column_for_byte_index(end - 1) + 2,
            );
            start = end;
        }
        regions
    }
}
