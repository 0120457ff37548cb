//! The `decoder` module provides [`HexDecoder`], the inverse of the encoder: it parses
//! hex-view lines back into the exact bytes they show.
//!
//! Only the hex field is authoritative. The ASCII gutter is ignored, so a line whose
//! gutter went stale after an edit still decodes to the edited bytes.

use crate::error::{HexViewError, HexViewErrorKind};
use crate::layout::{Layout, LayoutConfig};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static LINE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-fA-F]{8,16}):").expect("line prefix pattern must compile")
});

/// Address and bytes recovered from one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub address: u64,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct HexDecoder {
    layout: Layout,
}

impl HexDecoder {
    /// Creates a decoder for the given config.
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

    /// Parses the address and the hex field of a line.
    ///
    /// # Errors
    /// - Returns an error if the line does not start with an address
    /// - Returns an error if the `" :"` divider is missing
    /// - Returns an error if the hex field holds non-hex characters or an odd nibble count
    /// - Returns an error if the line holds more bytes than the layout allows
    pub fn parse_line(&self, text: &str) -> Result<ParsedLine, HexViewErrorKind> {
        let text = text.strip_suffix('\r').unwrap_or(text);

        let captures = LINE_PREFIX
            .captures(text)
            .ok_or(HexViewErrorKind::MissingAddress)?;
        let address = captures
            .get(1)
            .and_then(|m| u64::from_str_radix(m.as_str(), 16).ok())
            .ok_or(HexViewErrorKind::MissingAddress)?;

        let rest = &text[captures.get(0).map_or(0, |m| m.end())..];
        let field = rest
            .find(" :")
            .map(|divider| &rest[..divider])
            .ok_or(HexViewErrorKind::MissingAsciiDivider)?;

        let digits: Vec<u8> = field
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        if !digits.iter().all(u8::is_ascii_hexdigit) {
            return Err(HexViewErrorKind::ContainsInvalidCharacters);
        }
        if digits.len() % 2 != 0 {
            return Err(HexViewErrorKind::OddNibbleCount);
        }

        let bytes: Vec<u8> = digits
            .chunks_exact(2)
            .map(|pair| (nibble(pair[0]) << 4) | nibble(pair[1]))
            .collect();

        if bytes.len() > self.layout.bytes_per_line() {
            return Err(HexViewErrorKind::TooManyBytes(
                self.layout.bytes_per_line(),
                bytes.len(),
            ));
        }

        Ok(ParsedLine { address, bytes })
    }

    /// Decodes the bytes of a single line.
    ///
    /// # Errors
    /// Same as [`HexDecoder::parse_line`].
    ///
    /// # Examples
    /// ```
    /// use hexviewlib::{HexDecoder, LayoutConfig};
    ///
    /// let decoder = HexDecoder::new(&LayoutConfig::default()).unwrap();
    /// let bytes = decoder.decode_line("00000000:  0a0B 0c   :...").unwrap();
    /// assert_eq!(bytes, vec![0x0a, 0x0b, 0x0c]);
    /// ```
    pub fn decode_line(&self, text: &str) -> Result<Vec<u8>, HexViewErrorKind> {
        self.parse_line(text).map(|parsed| parsed.bytes)
    }

    /// Lazily decodes lines in order. Empty lines are skipped, the first malformed line
    /// ends the stream with an error carrying its 1-based line number.
    pub fn decode_stream<I, S>(&self, lines: I) -> DecodeStream<I::IntoIter>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        DecodeStream {
            decoder: *self,
            lines: lines.into_iter(),
            line_number: 0,
            failed: false,
        }
    }

    /// Decodes a whole hex-text buffer into one byte vector.
    ///
    /// # Errors
    /// Returns the first malformed line.
    pub fn decode_text(&self, text: &str) -> Result<Vec<u8>, HexViewError> {
        let mut out = Vec::new();
        for chunk in self.decode_stream(text.split('\n')) {
            out.extend(chunk?);
        }
        Ok(out)
    }
}

/// Iterator returned by [`HexDecoder::decode_stream`].
#[derive(Debug)]
pub struct DecodeStream<I> {
    decoder: HexDecoder,
    lines: I,
    line_number: usize,
    failed: bool,
}

impl<I> DecodeStream<I> {
    /// Number of lines consumed so far, including skipped empty ones.
    #[must_use]
    pub const fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<I, S> Iterator for DecodeStream<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Result<Vec<u8>, HexViewError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            let text = line.as_ref();
            if text.trim().is_empty() {
                continue;
            }
            let res = self
                .decoder
                .decode_line(text)
                .map_err(|kind| HexViewError::MalformedLine(kind, self.line_number));
            self.failed = res.is_err();
            return Some(res);
        }
    }
}

const fn nibble(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}
