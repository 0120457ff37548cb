//! The `edit` module provides [`EditDiffEngine`], which validates an edit payload for a
//! byte selection, rebuilds the whole line and reports which bytes actually changed.
//!
//! The engine never touches a text buffer: callers apply [`EditOutcome::line`] and use
//! [`EditOutcome::changed`] to mark dirty regions.

use crate::encoder::{HexEncoder, Line};
use crate::error::{HexViewError, HexViewErrorKind};
use crate::layout::Layout;
use std::ops::Range;

/// Prefix marking a payload as literal text instead of hex digits.
pub const TEXT_PAYLOAD_PREFIX: &str = "s:";

/// One run of consecutive changed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedRange {
    /// Byte indices in the line
    pub bytes: Range<usize>,
    /// Absolute hex columns, from the first upper nibble to after the last lower nibble
    pub hex: Range<usize>,
    /// Absolute ASCII columns
    pub ascii: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    /// Line re-rendered with the new bytes
    pub line: Line,
    /// Changed runs, ordered and non-overlapping. Empty if the edit was a no-op.
    pub changed: Vec<ChangedRange>,
}

#[derive(Debug, Clone, Copy)]
pub struct EditDiffEngine {
    encoder: HexEncoder,
}

impl EditDiffEngine {
    #[must_use]
    pub const fn new(layout: Layout) -> Self {
        Self {
            encoder: HexEncoder::from_layout(layout),
        }
    }

    /// Parses an edit payload that must replace exactly `expected_bytes` bytes.
    ///
    /// Hex payloads ignore whitespace. Payloads starting with `s:` are taken as literal
    /// text and replaced by its UTF-8 bytes. The length is checked before the characters.
    ///
    /// # Errors
    /// - Returns an error if the payload size differs from the selection
    /// - Returns an error if a hex payload holds non-hex characters
    ///
    /// # Examples
    /// ```
    /// use hexviewlib::EditDiffEngine;
    ///
    /// assert_eq!(EditDiffEngine::parse_payload("de AD", 2), Ok(vec![0xde, 0xad]));
    /// assert_eq!(EditDiffEngine::parse_payload("s:Hi", 2), Ok(vec![b'H', b'i']));
    /// ```
    pub fn parse_payload(
        payload: &str,
        expected_bytes: usize,
    ) -> Result<Vec<u8>, HexViewErrorKind> {
        let expected = expected_bytes * 2;

        if let Some(text) = payload.strip_prefix(TEXT_PAYLOAD_PREFIX) {
            let received = text.len() * 2;
            if received != expected {
                return Err(HexViewErrorKind::WrongLength { expected, received });
            }
            return Ok(text.as_bytes().to_vec());
        }

        let digits: Vec<char> = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() != expected {
            return Err(HexViewErrorKind::WrongLength {
                expected,
                received: digits.len(),
            });
        }
        if !digits.iter().all(char::is_ascii_hexdigit) {
            return Err(HexViewErrorKind::InvalidCharacters);
        }

        Ok(digits
            .chunks_exact(2)
            .filter_map(|pair| {
                let high = pair[0].to_digit(16)?;
                let low = pair[1].to_digit(16)?;
                u8::try_from((high << 4) | low).ok()
            })
            .collect())
    }

    /// Replaces the bytes `range` of `line` with `payload` and diffs the result against
    /// the original line.
    ///
    /// # Errors
    /// - Returns an error if `range` is empty or reaches past the line
    /// - Returns an error if the payload is rejected by [`EditDiffEngine::parse_payload`]
    pub fn apply_edit(
        &self,
        line: &Line,
        range: Range<usize>,
        payload: &str,
    ) -> Result<EditOutcome, HexViewError> {
        if range.is_empty() {
            return Err(HexViewError::EditValidation(HexViewErrorKind::EmptySelection));
        }
        if range.end > line.bytes.len() {
            return Err(HexViewError::EditValidation(
                HexViewErrorKind::SelectionOutOfLine(range.end, line.bytes.len()),
            ));
        }

        let replacement =
            Self::parse_payload(payload, range.len()).map_err(HexViewError::EditValidation)?;

        let mut bytes = line.bytes.clone();
        bytes[range].copy_from_slice(&replacement);

        if bytes == line.bytes {
            log::debug!("Edit at 0x{:08x} left the line unchanged", line.address);
            return Ok(EditOutcome {
                line: line.clone(),
                changed: Vec::new(),
            });
        }

        let changed = self.diff(&line.bytes, &bytes);
        let line = self.encoder.encode_at(&bytes, line.address)?;
        Ok(EditOutcome { line, changed })
    }

    /// Runs of differing bytes between two equally long lines.
    fn diff(&self, old: &[u8], new: &[u8]) -> Vec<ChangedRange> {
        let layout = self.encoder.layout();
        let mut changed = Vec::new();
        let mut run_start: Option<usize> = None;

        for index in 0..=new.len() {
            let differs = index < new.len() && old.get(index) != new.get(index);
            match (run_start, differs) {
                (None, true) => run_start = Some(index),
                (Some(start), false) => {
                    changed.push(ChangedRange {
                        bytes: start..index,
                        hex: layout.column_for_byte_index(start)
                            ..layout.column_for_byte_index(index - 1) + 2,
                        ascii: layout.ascii_column_for_byte_index(start)
                            ..layout.ascii_column_for_byte_index(index),
                    });
                    run_start = None;
                }
                _ => {}
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutConfig;

    fn engine_and_line(bits: usize, bytes: usize, data: &[u8]) -> (EditDiffEngine, Line) {
        let layout = Layout::new(&LayoutConfig {
            bits_per_group: bits,
            bytes_per_line: bytes,
            lowercase_hex: true,
        })
        .unwrap();
        let line = HexEncoder::from_layout(layout).encode_at(data, 0).unwrap();
        (EditDiffEngine::new(layout), line)
    }

    #[test]
    fn test_single_byte_change_is_minimal() {
        // Arrange
        let (engine, line) = engine_and_line(8, 8, &[0xAA, 0xBB, 0xCC]);

        // Act
        let outcome = engine.apply_edit(&line, 0..3, "AA 11 CC").unwrap();

        // Assert
        assert_eq!(outcome.line.bytes, vec![0xAA, 0x11, 0xCC]);
        assert_eq!(
            outcome.changed,
            vec![ChangedRange {
                bytes: 1..2,
                hex: 14..16,
                ascii: 38..39,
            }]
        );
        assert!(outcome.line.to_string().starts_with("00000000:  aa 11 cc"));
        assert!(outcome.line.to_string().ends_with(":..."));
    }

    #[test]
    fn test_run_spans_group_separators() {
        // Arrange
        let (engine, line) = engine_and_line(16, 8, &[0, 1, 2, 3, 4, 5, 6, 7]);

        // Act
        let outcome = engine.apply_edit(&line, 1..7, "ff ff 03 ff ff ff").unwrap();

        // Assert
        // Bytes 1..3 and 4..7 changed, byte 3 kept its value
        let runs: Vec<_> = outcome.changed.iter().map(|c| c.bytes.clone()).collect();
        assert_eq!(runs, vec![1..3, 4..7]);
        // Byte 1 sits at column 13, byte 2 ends at column 18 across the separator
        assert_eq!(outcome.changed[0].hex, 13..18);
    }

    #[test]
    fn test_wrong_length_is_reported_in_hex_chars() {
        // Arrange
        let (engine, line) = engine_and_line(8, 8, &[0xAA, 0xBB]);

        // Act
        let res = engine.apply_edit(&line, 0..2, "123");

        // Assert
        assert!(matches!(
            res,
            Err(HexViewError::EditValidation(HexViewErrorKind::WrongLength {
                expected: 4,
                received: 3
            }))
        ));
    }

    #[test]
    fn test_length_is_checked_before_characters() {
        assert_eq!(
            EditDiffEngine::parse_payload("zz z", 1),
            Err(HexViewErrorKind::WrongLength {
                expected: 2,
                received: 3
            })
        );
        assert_eq!(
            EditDiffEngine::parse_payload("zz", 1),
            Err(HexViewErrorKind::InvalidCharacters)
        );
    }

    #[test]
    fn test_text_payload() {
        // Arrange
        let (engine, line) = engine_and_line(8, 8, b"abcd");

        // Act
        let outcome = engine.apply_edit(&line, 1..3, "s:XY").unwrap();
        let too_long = engine.apply_edit(&line, 1..3, "s:XYZ");

        // Assert
        assert_eq!(outcome.line.ascii, "aXYd");
        assert_eq!(outcome.changed.len(), 1);
        assert!(matches!(
            too_long,
            Err(HexViewError::EditValidation(HexViewErrorKind::WrongLength {
                expected: 4,
                received: 6
            }))
        ));
    }

    #[test]
    fn test_unchanged_payload_is_noop() {
        // Arrange
        let (engine, line) = engine_and_line(8, 8, &[0x10, 0x20]);

        // Act
        let outcome = engine.apply_edit(&line, 0..2, "1020").unwrap();

        // Assert
        assert!(outcome.changed.is_empty());
        assert_eq!(outcome.line, line);
    }

    #[test]
    fn test_selection_must_fit_line() {
        // Arrange
        let (engine, line) = engine_and_line(8, 8, &[0x10, 0x20]);

        // Act
        let empty = engine.apply_edit(&line, 1..1, "");
        let past_end = engine.apply_edit(&line, 1..3, "0000");

        // Assert
        assert!(matches!(
            empty,
            Err(HexViewError::EditValidation(HexViewErrorKind::EmptySelection))
        ));
        assert!(matches!(
            past_end,
            Err(HexViewError::EditValidation(
                HexViewErrorKind::SelectionOutOfLine(3, 2)
            ))
        ));
    }
}
