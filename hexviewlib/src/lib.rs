//! # `hexviewlib`
//!
//! `hexviewlib` is a Rust library for rendering binary data as an editable hex-text view
//! and turning that text back into the exact bytes it shows.
//!
//! The library provides:
//! - Column arithmetic for a configurable line layout (via [`Layout`]).
//! - Binary to hex-text rendering ([`HexEncoder`]) and its inverse ([`HexDecoder`]).
//! - Mapping of text selections to byte ranges with nibble snapping ([`SelectionMapper`]).
//! - Edit validation and minimal change reports ([`EditDiffEngine`]).
//! - Pluggable checksums ([`DigestRegistry`]) and a cancellable [`ChecksumDriver`].
//! - Fixed-width value inspection of the bytes under the cursor ([`Inspection`]).
//! - Error handling with [`HexViewError`].
//!
//! ## Example
//!
//! ```
//! use hexviewlib::{HexDecoder, HexEncoder, LayoutConfig};
//!
//! let config = LayoutConfig { bits_per_group: 16, bytes_per_line: 8, lowercase_hex: true };
//! let encoder = HexEncoder::new(&config).unwrap();
//! let decoder = HexDecoder::new(&config).unwrap();
//!
//! let text = encoder.render(b"Hello, hex!", 0);
//! assert_eq!(decoder.decode_text(&text).unwrap(), b"Hello, hex!");
//! ```

mod checksum;
mod decoder;
mod digest;
mod edit;
mod encoder;
mod error;
mod inspector;
mod layout;
mod selection;

// Public APIs
pub use checksum::{CancelToken, ChecksumDriver, ChecksumState, Progress};
pub use decoder::{DecodeStream, HexDecoder, ParsedLine};
pub use digest::{DEFAULT_ALGORITHM, Digest, DigestError, DigestFactory, DigestRegistry};
pub use edit::{ChangedRange, EditDiffEngine, EditOutcome, TEXT_PAYLOAD_PREFIX};
pub use encoder::{HexEncoder, Line, ascii_char};
pub use error::{HexViewError, HexViewErrorKind};
pub use inspector::{Endianness, Inspection, format_float, format_with_separators};
pub use layout::{
    ADDRESS_OFFSET, ASCII_OFFSET, AddressLocation, Layout, LayoutConfig, Nibble, VALID_BITS,
    VALID_BYTES,
};
pub use selection::{ByteSelection, SelectionMapper};
