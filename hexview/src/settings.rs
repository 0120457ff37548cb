use hexviewlib::{
    DEFAULT_ALGORITHM, Endianness, HexViewError, Layout, LayoutConfig, VALID_BITS, VALID_BYTES,
};
use std::time::Duration;

/// User facing options of a [`crate::HexSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Group size in bits, one of [`VALID_BITS`]
    pub group_bits: usize,
    /// Bytes per line, one of [`VALID_BYTES`]
    pub bytes_per_line: usize,
    pub lowercase_hex: bool,
    /// Address shown for the first byte of the file
    pub starting_address: u64,
    /// Files above this size (in KB of 1000 bytes) are not converted
    pub max_file_size_kb: u64,
    /// Hash the exported bytes while writing them
    pub checksum_on_save: bool,
    pub hash_algorithm: String,
    /// Stop counting selected bytes once `highlight_max_bytes` is reached
    pub highlight_throttle: bool,
    pub highlight_max_bytes: usize,
    pub inspector_endianness: Endianness,
    /// Quiet period before the highlighter reacts to selection changes
    pub highlight_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let layout = LayoutConfig::default();
        Self {
            group_bits: layout.bits_per_group,
            bytes_per_line: layout.bytes_per_line,
            lowercase_hex: layout.lowercase_hex,
            starting_address: 0,
            max_file_size_kb: 50_000,
            checksum_on_save: true,
            hash_algorithm: DEFAULT_ALGORITHM.to_string(),
            highlight_throttle: false,
            highlight_max_bytes: 1000,
            inspector_endianness: Endianness::Little,
            highlight_delay: Duration::from_millis(500),
        }
    }
}

impl Settings {
    /// Layout options with unsupported values replaced by the defaults.
    #[must_use]
    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig {
            bits_per_group: self.group_bits,
            bytes_per_line: self.bytes_per_line,
            lowercase_hex: self.lowercase_hex,
        }
        .sanitized()
    }

    /// # Errors
    /// Returns an error if the sanitized layout is still rejected.
    pub fn layout(&self) -> Result<Layout, HexViewError> {
        Layout::new(&self.layout_config())
    }

    /// Size limit in bytes.
    #[must_use]
    pub const fn max_file_size(&self) -> u64 {
        self.max_file_size_kb.saturating_mul(1000)
    }
}
