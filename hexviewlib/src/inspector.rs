//! The `inspector` module interprets up to eight bytes under the cursor as fixed-width
//! integers and floats.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Little => Self::Big,
            Self::Big => Self::Little,
        }
    }
}

impl FromStr for Endianness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(Self::Little),
            "big" | "be" => Ok(Self::Big),
            other => Err(format!("Unknown endianness '{other}'")),
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Little => write!(f, "Little Endian"),
            Self::Big => write!(f, "Big Endian"),
        }
    }
}

/// Groups the digits of an integer in threes, e.g. `-1234567` as `-1,234,567`.
pub fn format_with_separators<T: fmt::Display>(value: T) -> String {
    let text = value.to_string();
    let (sign, digits) = text.split_at(usize::from(text.starts_with('-')));

    let mut grouped = String::with_capacity(text.len() + digits.len() / 3);
    grouped.push_str(sign);
    for (index, digit) in digits.char_indices() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// Fixed notation with grouped integer digits and no trailing zeros, scientific notation
/// outside `1e-5..1e6`. NaN and infinities are spelled out.
pub fn format_float<T: Into<f64>>(float_value: T) -> String {
    let f = float_value.into();
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Scientific notation for very large or very small magnitudes
    if f.abs() >= 1e6 || (f != 0.0 && f.abs() < 1e-5) {
        return format!("{f:e}");
    }

    let fixed = format!("{f:.17}");
    let fixed = fixed.trim_end_matches('0').trim_end_matches('.');
    match fixed.split_once('.') {
        Some((whole, fraction)) => format!("{}.{fraction}", format_with_separators(whole)),
        None => format_with_separators(fixed),
    }
}

/// Values decoded from the bytes under the cursor. A width is `None` when fewer bytes
/// than it needs are available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inspection {
    pub endianness: Endianness,
    pub byte: Option<u8>,
    pub short: Option<i8>,
    pub word: Option<u16>,
    pub int: Option<i16>,
    pub dword: Option<u32>,
    pub longint: Option<i32>,
    pub qword: Option<u64>,
    pub longlongint: Option<i64>,
    pub float: Option<f32>,
    pub double: Option<f64>,
}

fn take<const N: usize>(bytes: &[u8], endianness: Endianness) -> Option<[u8; N]> {
    let mut array: [u8; N] = bytes.get(..N)?.try_into().ok()?;
    // Everything below is decoded as little endian
    if endianness == Endianness::Big {
        array.reverse();
    }
    Some(array)
}

impl Inspection {
    /// Decodes the leading bytes of `bytes`; anything past the eighth byte is ignored.
    ///
    /// # Examples
    /// ```
    /// use hexviewlib::{Endianness, Inspection};
    ///
    /// let le = Inspection::from_bytes(&[0x01, 0x02], Endianness::Little);
    /// let be = Inspection::from_bytes(&[0x01, 0x02], Endianness::Big);
    /// assert_eq!(le.word, Some(0x0201));
    /// assert_eq!(be.word, Some(0x0102));
    /// assert_eq!(be.dword, None);
    /// ```
    #[must_use]
    pub fn from_bytes(bytes: &[u8], endianness: Endianness) -> Self {
        let b1 = take::<1>(bytes, endianness);
        let b2 = take::<2>(bytes, endianness);
        let b4 = take::<4>(bytes, endianness);
        let b8 = take::<8>(bytes, endianness);
        Self {
            endianness,
            byte: b1.map(u8::from_le_bytes),
            short: b1.map(i8::from_le_bytes),
            word: b2.map(u16::from_le_bytes),
            int: b2.map(i16::from_le_bytes),
            dword: b4.map(u32::from_le_bytes),
            longint: b4.map(i32::from_le_bytes),
            qword: b8.map(u64::from_le_bytes),
            longlongint: b8.map(i64::from_le_bytes),
            float: b4.map(f32::from_le_bytes),
            double: b8.map(f64::from_le_bytes),
        }
    }

    /// Label/value rows in display order.
    #[must_use]
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        fn or_missing<T>(value: Option<T>, f: impl Fn(T) -> String) -> String {
            value.map_or_else(|| "--".to_string(), f)
        }
        vec![
            ("byte", or_missing(self.byte, format_with_separators)),
            ("short", or_missing(self.short, format_with_separators)),
            ("word", or_missing(self.word, format_with_separators)),
            ("int", or_missing(self.int, format_with_separators)),
            ("dword", or_missing(self.dword, format_with_separators)),
            ("longint", or_missing(self.longint, format_with_separators)),
            ("qword", or_missing(self.qword, format_with_separators)),
            ("longlongint", or_missing(self.longlongint, format_with_separators)),
            ("float", or_missing(self.float, format_float)),
            ("double", or_missing(self.double, format_float)),
            ("binary", or_missing(self.byte, |b| format!("{b:08b}"))),
        ]
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>28}: {}", "Hex Inspector", self.endianness)?;
        let rows = self.rows();
        for pair in rows.chunks(2) {
            let line = pair
                .iter()
                .map(|(label, value)| format!("{label:<12}:  {value:<26}"))
                .collect::<String>();
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}
